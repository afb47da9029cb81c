//! Concurrent language jobs.
//!
//! One job per language, at most `threads` at a time. Each attempt runs the
//! synchronous traversal on the blocking pool; retryable failures are retried
//! from scratch per the [`RetryPolicy`], and a failed language never affects
//! the others. Job events are funnelled through one channel to a single
//! journal writer task.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::config::{self, Config, RangeSettings};
use crate::domain::{
    CategoryProgress, ContentTree, ExportEvent, ExportEventType, LogProgress, ProgressSink,
};
use crate::error::ExportError;
use crate::export::{export_language, AssetPresenceChecker, JobReport};
use crate::source::{SourceLoader, SqliteSource};

use super::journal::Journal;
use super::progress::{Progress, ProgressSnapshot};
use super::retry::RetryPolicy;

/// Final state of one language job
#[derive(Debug)]
pub enum JobOutcome {
    Completed(JobReport),
    Failed { error: String, attempts: u32 },
    /// Shutdown was requested before the job started
    Skipped,
}

#[derive(Debug)]
pub struct JobResult {
    pub language: String,
    pub outcome: JobOutcome,
}

/// Outcome of a whole run, jobs in configured language order
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub jobs: Vec<JobResult>,
    pub progress: ProgressSnapshot,
}

impl RunSummary {
    pub fn completed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter_map(|j| match &j.outcome {
            JobOutcome::Completed(report) => Some(report),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobResult> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.outcome, JobOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.jobs
            .iter()
            .all(|j| matches!(j.outcome, JobOutcome::Completed(_)))
    }

    pub fn outcome(&self, language: &str) -> Option<&JobOutcome> {
        self.jobs
            .iter()
            .find(|j| j.language == language)
            .map(|j| &j.outcome)
    }
}

/// Schedules and retries language jobs over a shared tree
pub struct JobRunner {
    threads: usize,
    retry: RetryPolicy,
    export_dir: PathBuf,
    preview_dir: PathBuf,
    journal: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
    progress: Arc<Progress>,
}

impl JobRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            threads: config.threads,
            retry: config.retry.clone(),
            export_dir: config.export_dir.clone(),
            preview_dir: config.preview_dir.clone(),
            journal: config.journal.then(|| config.journal_path()),
            shutdown: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Progress::new()),
        }
    }

    /// Share an externally owned shutdown flag (set by the Ctrl-C handler)
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Run one job per language and wait for all of them
    #[instrument(skip(self, tree, languages), fields(languages = languages.len()))]
    pub async fn run(&self, tree: Arc<ContentTree>, languages: &[String]) -> RunSummary {
        let run_id = Uuid::new_v4();
        info!(%run_id, threads = self.threads, "Starting export run");
        self.progress.start(languages.len());

        let (events, journal_task) = self.spawn_journal();
        let semaphore = Arc::new(Semaphore::new(self.threads));
        let mut set = JoinSet::new();

        for (idx, language) in languages.iter().enumerate() {
            let job = Job {
                run_id,
                language: language.clone(),
                target: config::snapshot_path(&self.export_dir, language),
                preview_dir: self.preview_dir.clone(),
                retry: self.retry.clone(),
                tree: Arc::clone(&tree),
                shutdown: Arc::clone(&self.shutdown),
                progress: Arc::clone(&self.progress),
                events: events.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => job.run().await,
                    Err(_) => JobOutcome::Skipped,
                };
                (idx, job.language, outcome)
            });
        }
        drop(events);

        let mut slots: Vec<Option<JobResult>> = languages.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, language, outcome)) => {
                    slots[idx] = Some(JobResult { language, outcome });
                }
                Err(e) => error!(error = %e, "Job task panicked"),
            }
            log_progress(&self.progress.snapshot());
        }

        if let Some(task) = journal_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Journal writer stopped unexpectedly");
            }
        }

        let jobs = slots
            .into_iter()
            .zip(languages)
            .map(|(slot, language)| {
                slot.unwrap_or_else(|| JobResult {
                    language: language.clone(),
                    outcome: JobOutcome::Failed {
                        error: "job task panicked".to_string(),
                        attempts: 0,
                    },
                })
            })
            .collect();

        let summary = RunSummary {
            run_id,
            jobs,
            progress: self.progress.snapshot(),
        };
        info!(
            %run_id,
            completed = summary.progress.completed,
            failed = summary.progress.failed,
            skipped = summary.progress.skipped,
            elapsed_ms = summary.progress.elapsed.as_millis() as u64,
            "Export run finished"
        );
        summary
    }

    /// Channel plus writer task; without a journal events are dropped
    fn spawn_journal(
        &self,
    ) -> (
        Option<mpsc::UnboundedSender<ExportEvent>>,
        Option<tokio::task::JoinHandle<()>>,
    ) {
        let Some(path) = self.journal.clone() else {
            return (None, None);
        };
        let (tx, mut rx) = mpsc::unbounded_channel::<ExportEvent>();
        let task = tokio::spawn(async move {
            let journal = Journal::new(path);
            while let Some(event) = rx.recv().await {
                if let Err(e) = journal.append(&event).await {
                    warn!(error = %e, file = %journal.path().display(), "Failed to append journal event");
                }
            }
        });
        (Some(tx), Some(task))
    }
}

struct Job {
    run_id: Uuid,
    language: String,
    target: PathBuf,
    preview_dir: PathBuf,
    retry: RetryPolicy,
    tree: Arc<ContentTree>,
    shutdown: Arc<AtomicBool>,
    progress: Arc<Progress>,
    events: Option<mpsc::UnboundedSender<ExportEvent>>,
}

impl Job {
    async fn run(&self) -> JobOutcome {
        if self.shutdown.load(Ordering::Relaxed) {
            info!(lang = %self.language, "Shutdown requested, job skipped");
            self.emit(ExportEvent::new(self.run_id, &self.language, ExportEventType::JobSkipped, 0));
            self.progress.mark_skipped();
            return JobOutcome::Skipped;
        }

        self.progress.begin_job();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.emit(ExportEvent::new(
                self.run_id,
                &self.language,
                ExportEventType::JobStarted,
                attempt,
            ));

            match self.attempt(attempt).await {
                Ok(report) => {
                    let progress = CategoryProgress {
                        categories_done: report.snapshot.counts.categories,
                        categories_total: self.tree.categories.len(),
                        affirmations: report.snapshot.counts.affirmations,
                    };
                    self.emit(
                        ExportEvent::new(self.run_id, &self.language, ExportEventType::JobCompleted, attempt)
                            .with_progress(&progress)
                            .with_digest(report.snapshot.digest.clone()),
                    );
                    self.progress.mark_completed();
                    return JobOutcome::Completed(report);
                }
                Err(e) => {
                    let retry = e.is_retryable()
                        && self.retry.should_retry(attempt)
                        && !self.shutdown.load(Ordering::Relaxed);

                    if retry {
                        let delay = self.retry.delay_for_attempt(attempt);
                        self.emit(
                            ExportEvent::new(self.run_id, &self.language, ExportEventType::JobRetrying, attempt)
                                .with_error(e.to_string()),
                        );
                        warn!(
                            lang = %self.language,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Export failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        if !self.shutdown.load(Ordering::Relaxed) {
                            continue;
                        }
                        info!(lang = %self.language, attempt, "Shutdown requested during retry delay");
                        let cancelled = ExportError::Cancelled {
                            language: self.language.clone(),
                        };
                        return self.fail(&cancelled, attempt);
                    }

                    return self.fail(&e, attempt);
                }
            }
        }
    }

    fn fail(&self, e: &ExportError, attempt: u32) -> JobOutcome {
        self.emit(
            ExportEvent::new(self.run_id, &self.language, ExportEventType::JobFailed, attempt)
                .with_error(e.to_string()),
        );
        error!(
            lang = %self.language,
            attempt,
            retryable = e.is_retryable(),
            error = %e,
            "Export failed permanently"
        );
        self.progress.mark_failed();
        JobOutcome::Failed {
            error: e.to_string(),
            attempts: attempt,
        }
    }

    /// One full export from a fresh file on the blocking pool
    async fn attempt(&self, attempt: u32) -> Result<JobReport, ExportError> {
        let span = info_span!("job", lang = %self.language, attempt);
        let tree = Arc::clone(&self.tree);
        let language = self.language.clone();
        let target = self.target.clone();
        let preview_dir = self.preview_dir.clone();
        let cancel = Arc::clone(&self.shutdown);
        let mut sink = ChannelProgress {
            run_id: self.run_id,
            attempt,
            events: self.events.clone(),
        };

        let task = tokio::task::spawn_blocking(move || {
            let _guard = span.enter();
            let assets = AssetPresenceChecker::scan(&preview_dir);
            export_language(&tree, &language, &target, &assets, &mut sink, &cancel)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(ExportError::Io(std::io::Error::other(format!(
                "export task aborted: {}",
                e
            )))),
        }
    }

    fn emit(&self, event: ExportEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Logs category progress and forwards it to the journal
struct ChannelProgress {
    run_id: Uuid,
    attempt: u32,
    events: Option<mpsc::UnboundedSender<ExportEvent>>,
}

impl ProgressSink for ChannelProgress {
    fn category_completed(&mut self, language: &str, progress: &CategoryProgress) {
        LogProgress.category_completed(language, progress);
        if let Some(tx) = &self.events {
            let event = ExportEvent::new(
                self.run_id,
                language,
                ExportEventType::CategoryCompleted,
                self.attempt,
            )
            .with_progress(progress);
            let _ = tx.send(event);
        }
    }
}

fn log_progress(snap: &ProgressSnapshot) {
    info!(
        done = snap.completed + snap.failed + snap.skipped,
        total = snap.total,
        completed = snap.completed,
        failed = snap.failed,
        skipped = snap.skipped,
        in_progress = snap.in_progress,
        eta_secs = snap.eta.map(|d| d.as_secs()),
        "Run progress"
    );
}

/// Load the source store into a content tree, retrying connectivity errors.
///
/// Malformed source data is returned immediately.
pub async fn load_tree(config: &Config) -> Result<ContentTree> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let source_db = config.source_db.clone();
        let range = config.range;
        let versions = config.versions.clone();

        let task = tokio::task::spawn_blocking(move || build_tree(&source_db, range, &versions));
        let err = match task.await {
            Ok(Ok(tree)) => return Ok(tree),
            Ok(Err(e)) => e,
            Err(e) => anyhow::bail!("Source load task failed: {}", e),
        };

        if !(err.is_retryable() && config.retry.should_retry(attempt)) {
            error!(file = %config.source_db.display(), attempt, error = %err, "Source load failed");
            return Err(err.into());
        }
        let delay = config.retry.delay_for_attempt(attempt);
        warn!(
            file = %config.source_db.display(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Source load failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn build_tree(
    source_db: &std::path::Path,
    range: RangeSettings,
    versions: &[String],
) -> Result<ContentTree, ExportError> {
    let store = SqliteSource::open(source_db)?;
    let rows = SourceLoader::new(&store, range, versions).load()?;
    let tree = ContentTree::build(rows);
    let stats = tree.stats();
    info!(
        categories = stats.categories,
        subcategories = stats.subcategories,
        coaches = stats.coaches,
        affirmations = stats.affirmations,
        "Content tree built"
    );
    Ok(tree)
}
