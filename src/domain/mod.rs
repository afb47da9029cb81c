//! Domain types for the exporter.
//!
//! - Locale payloads: typed shapes of the JSON locale columns
//! - Source rows: decoded rows of the four source tables
//! - Tree: the joined, ordered content tree
//! - Output rows: resolved records written to a snapshot
//! - Events: job lifecycle and progress records

pub mod events;
pub mod locale;
pub mod output;
pub mod source;
pub mod tree;

pub use events::{CategoryProgress, ExportEvent, ExportEventType, LogProgress, ProgressSink};
pub use locale::{Gender, Localized, PerGender};
pub use output::{AffirmationRow, CategoryBatch, CategoryRow, CoachRow, OutputRow, SubcategoryRow};
pub use source::{AffirmationSource, Category, Coach, SourceRows, Subcategory};
pub use tree::{CategoryNode, CoachEntry, ContentTree, SubcategoryNode, TreeStats};
