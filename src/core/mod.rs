//! Run orchestration.
//!
//! This module contains:
//! - JobRunner: concurrent, retried language jobs
//! - RetryPolicy: attempt count and delays
//! - Progress: run-level counters with ETA
//! - Journal: append-only JSONL event log

pub mod journal;
pub mod progress;
pub mod retry;
pub mod runner;

// Re-export commonly used types
pub use journal::{JobState, Journal, LanguageStatus, RunStatus};
pub use progress::{Progress, ProgressSnapshot};
pub use retry::RetryPolicy;
pub use runner::{load_tree, JobOutcome, JobResult, JobRunner, RunSummary};
