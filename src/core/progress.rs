//! Run-level progress across language jobs.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Point-in-time view of a [`Progress`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub in_progress: usize,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    total: usize,
    completed: usize,
    failed: usize,
    skipped: usize,
    in_progress: usize,
    started_at: Option<Instant>,
}

/// Thread-safe job counters with an ETA estimate
#[derive(Debug, Default)]
pub struct Progress {
    inner: Mutex<Counters>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, total: usize) {
        let mut c = self.lock();
        *c = Counters {
            total,
            started_at: Some(Instant::now()),
            ..Default::default()
        };
    }

    pub fn begin_job(&self) {
        self.lock().in_progress += 1;
    }

    pub fn mark_completed(&self) {
        let mut c = self.lock();
        c.completed += 1;
        c.in_progress = c.in_progress.saturating_sub(1);
    }

    pub fn mark_failed(&self) {
        let mut c = self.lock();
        c.failed += 1;
        c.in_progress = c.in_progress.saturating_sub(1);
    }

    /// Skipped jobs never called `begin_job`
    pub fn mark_skipped(&self) {
        self.lock().skipped += 1;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let c = self.lock();
        let elapsed = c.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let processed = c.completed + c.failed + c.skipped;
        let remaining = c.total.saturating_sub(processed);
        let eta = (processed > 0 && !elapsed.is_zero())
            .then(|| elapsed.mul_f64(remaining as f64 / processed as f64));

        ProgressSnapshot {
            total: c.total,
            completed: c.completed,
            failed: c.failed,
            skipped: c.skipped,
            in_progress: c.in_progress,
            elapsed,
            eta,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
