//! Error taxonomy for the export engine.
//!
//! Row-level resolution problems (missing localizations, missing subtitles,
//! missing preview files) never surface here: they are handled where they
//! occur by skipping or nulling and logging. What remains are the failures
//! that abort a job or the whole run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading source data or writing a snapshot
#[derive(Debug, Error)]
pub enum ExportError {
    /// A required locale column could not be decoded. Needs a data fix.
    #[error("Malformed {column} in {table} row {id}: {reason}")]
    MalformedSourceData {
        table: &'static str,
        id: i64,
        column: &'static str,
        reason: String,
    },

    /// The source store could not be opened or queried
    #[error("Source store error: {0}")]
    Source(#[source] rusqlite::Error),

    /// The snapshot file could not be opened or written
    #[error("Snapshot storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Another writer holds the snapshot lock
    #[error("Snapshot lock held: {}", path.display())]
    LockHeld { path: PathBuf },

    /// The job observed a shutdown request at a category boundary
    #[error("Export for {language} cancelled")]
    Cancelled { language: String },
}

impl ExportError {
    /// Whether re-running the whole job from scratch may succeed.
    ///
    /// Storage, IO, lock contention and source connectivity are transient.
    /// Malformed data and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Source(_) | Self::Storage { .. } | Self::Io(_) | Self::LockHeld { .. }
        )
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
