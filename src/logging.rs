//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over `logging.level`. When `logging.file` is set, the
//! same events are also written there without ANSI colors.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Filter from `RUST_LOG`, else from the configured level
pub fn filter_for(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&settings.level)))
}

/// Map config level names (`INFO`, `WARNING`, `CRITICAL`) to filter directives
pub fn level_directive(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Install the global subscriber
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let file_layer = match settings.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter_for(settings))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_directive("INFO"), "info");
        assert_eq!(level_directive(" WARNING "), "warn");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive(""), "info");
        assert_eq!(level_directive("lima_export=debug"), "lima_export=debug");
    }
}
