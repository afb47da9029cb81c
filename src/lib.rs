//! lima-export - per-language content snapshot exporter
//!
//! Reads the relational content source (categories, subcategories, coaches,
//! affirmations) and writes one self-contained SQLite snapshot per target
//! language, resolving locale and gender fallbacks and flagging which
//! preview images exist.
//!
//! # Architecture
//!
//! - The source is loaded once into an immutable content tree
//! - Each language is an independent job over the shared tree
//! - Jobs run concurrently on a bounded pool and are retried from scratch
//! - Job transitions are recorded in an append-only JSONL journal
//!
//! # Modules
//!
//! - `source`: Source store access and row decoding
//! - `domain`: Data structures (locale payloads, tree, output rows, events)
//! - `export`: Locale resolution, preview flags, snapshot writing
//! - `core`: Job runner, retry policy, progress, journal
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Export every configured language
//! lima-export --config config.yaml export
//!
//! # Only RU, two workers, plan without writing
//! lima-export export --language RU --threads 2 --dry-run
//!
//! # Outcome of the latest run
//! lima-export status
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod export;
pub mod logging;
pub mod source;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{JobOutcome, JobRunner, RetryPolicy, RunSummary};
pub use domain::ContentTree;
pub use error::{ExportError, Result};
pub use export::{export_language, JobReport};
