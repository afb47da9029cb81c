//! Export job events.
//!
//! Every job transition and every finished category is recorded as an
//! immutable event. The journal replays them to show the outcome of the
//! latest run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single event in the export journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The export run this event belongs to
    pub run_id: Uuid,

    /// Language code of the job
    pub language: String,

    /// Type of event
    pub event_type: ExportEventType,

    /// Attempt number (1-based)
    pub attempt: u32,

    /// Categories written so far
    pub categories_done: usize,

    /// Categories in the tree
    pub categories_total: usize,

    /// Cumulative affirmation rows written
    pub affirmations: usize,

    /// Error message if failed or retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Row digest of a completed job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ExportEvent {
    /// Create a new event with the current timestamp
    pub fn new(run_id: Uuid, language: &str, event_type: ExportEventType, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            language: language.to_string(),
            event_type,
            attempt,
            categories_done: 0,
            categories_total: 0,
            affirmations: 0,
            error: None,
            digest: None,
        }
    }

    pub fn with_progress(mut self, progress: &CategoryProgress) -> Self {
        self.categories_done = progress.categories_done;
        self.categories_total = progress.categories_total;
        self.affirmations = progress.affirmations;
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_digest(mut self, digest: String) -> Self {
        self.digest = Some(digest);
        self
    }
}

/// Types of events that can occur during an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportEventType {
    /// A job attempt began
    JobStarted,

    /// A category finished writing
    CategoryCompleted,

    /// An attempt failed and the job will run again
    JobRetrying,

    /// The snapshot is complete
    JobCompleted,

    /// The job gave up (fatal error or retries exhausted)
    JobFailed,

    /// The job never started (shutdown requested)
    JobSkipped,
}

/// Running totals reported at each category boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub categories_done: usize,
    pub categories_total: usize,
    pub affirmations: usize,
}

/// Receiver of per-category progress from inside a job
pub trait ProgressSink: Send {
    fn category_completed(&mut self, language: &str, progress: &CategoryProgress);
}

/// Sink that only logs
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn category_completed(&mut self, language: &str, progress: &CategoryProgress) {
        tracing::info!(
            lang = language,
            categories = %format!("{}/{}", progress.categories_done, progress.categories_total),
            affirmations = progress.affirmations,
            "Export progress"
        );
    }
}
