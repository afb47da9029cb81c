//! Append-only export journal with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL) next to the
//! snapshots, for easy inspection and for `lima-export status`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{ExportEvent, ExportEventType};

/// File-based journal using JSONL format
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &ExportEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<ExportEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        let mut line_num = 0;

        while let Some(line) = lines.next_line().await? {
            line_num += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event: ExportEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event at line {}", line_num))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Per-language outcome of the most recent run in the journal
    pub async fn latest_run(&self) -> Result<Option<RunStatus>> {
        let events = self.replay().await?;
        Ok(RunStatus::latest(&events))
    }
}

/// Where a language job ended up, derived from its events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed { digest: Option<String> },
    Failed { error: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageStatus {
    pub state: JobState,
    pub attempts: u32,
    pub categories_done: usize,
    pub categories_total: usize,
    pub affirmations: usize,
}

/// One run reconstructed from the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub languages: BTreeMap<String, LanguageStatus>,
}

impl RunStatus {
    /// Rebuild the run that the last event in `events` belongs to
    pub fn latest(events: &[ExportEvent]) -> Option<Self> {
        let run_id = events.last()?.run_id;
        let mut run_events = events.iter().filter(|e| e.run_id == run_id).peekable();
        let started_at = run_events.peek()?.timestamp;

        let mut languages: BTreeMap<String, LanguageStatus> = BTreeMap::new();
        for event in run_events {
            let status = languages
                .entry(event.language.clone())
                .or_insert_with(|| LanguageStatus {
                    state: JobState::Running,
                    attempts: 0,
                    categories_done: 0,
                    categories_total: 0,
                    affirmations: 0,
                });
            status.attempts = status.attempts.max(event.attempt);

            match event.event_type {
                ExportEventType::JobStarted => {
                    status.state = JobState::Running;
                    status.categories_done = 0;
                    status.affirmations = 0;
                }
                ExportEventType::CategoryCompleted => {
                    status.categories_done = event.categories_done;
                    status.categories_total = event.categories_total;
                    status.affirmations = event.affirmations;
                }
                ExportEventType::JobRetrying => {}
                ExportEventType::JobCompleted => {
                    status.state = JobState::Completed {
                        digest: event.digest.clone(),
                    };
                    status.categories_done = event.categories_done;
                    status.categories_total = event.categories_total;
                    status.affirmations = event.affirmations;
                }
                ExportEventType::JobFailed => {
                    status.state = JobState::Failed {
                        error: event.error.clone().unwrap_or_default(),
                    };
                }
                ExportEventType::JobSkipped => status.state = JobState::Skipped,
            }
        }

        Some(Self {
            run_id,
            started_at,
            languages,
        })
    }
}
