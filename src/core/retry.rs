//! Retry policy for export jobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy shared by all pipeline steps (`retry:` in config.yaml)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(rename = "attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before each retry; the last entry repeats once exhausted
    #[serde(default = "default_delays")]
    pub delays_sec: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delays() -> Vec<u64> {
    vec![5, 10]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_sec: default_delays(),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delays_sec: Vec::new(),
        }
    }

    /// Delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.delays_sec.is_empty() {
            return Duration::ZERO;
        }
        let idx = (attempt.max(1) as usize - 1).min(self.delays_sec.len() - 1);
        Duration::from_secs(self.delays_sec[idx])
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
