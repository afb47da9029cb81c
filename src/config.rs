//! Configuration for the export step.
//!
//! Configuration sources (highest priority first):
//! 1. CLI flags (`--threads`, `--language`)
//! 2. Environment variables (LIMA_SOURCE_DB, LIMA_EXPORT_DIR, LIMA_PREVIEW_DIR)
//! 3. Config file (config.yaml, shared with the other pipeline steps)
//! 4. Defaults
//!
//! Paths in the config file are relative to the config file's directory.
//! Keys that belong to other pipeline steps are ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::RetryPolicy;

/// Name of the step toggle under `steps:`
pub const STEP_NAME: &str = "export_data";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub steps: HashMap<String, bool>,
    #[serde(default)]
    pub range: RangeSettings,
    pub languages: Vec<String>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub export: ExportPaths,
}

fn default_threads() -> usize {
    4
}

/// Rank windows applied by the source loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RangeSettings {
    #[serde(default)]
    pub categories: RangeWindow,
    #[serde(default)]
    pub subcategories: RangeWindow,
    #[serde(default)]
    pub positions: RangeWindow,
}

/// 1-based inclusive window over position-ordered rows; `end == -1` is open.
///
/// Written in YAML as a two-element list: `[1, -1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<i64>")]
pub struct RangeWindow {
    pub start: i64,
    pub end: i64,
}

impl Default for RangeWindow {
    fn default() -> Self {
        Self { start: 1, end: -1 }
    }
}

impl TryFrom<Vec<i64>> for RangeWindow {
    type Error = String;

    fn try_from(value: Vec<i64>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [start, end] => Ok(Self {
                start: *start,
                end: *end,
            }),
            other => Err(format!(
                "range must contain exactly two integers, got {}",
                other.len()
            )),
        }
    }
}

impl RangeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether the 1-based `rank` falls inside the window
    pub fn contains(&self, rank: usize) -> bool {
        let rank = rank as i64;
        rank >= self.start.max(1) && (self.end == -1 || rank <= self.end)
    }

    /// Keep the items whose 1-based rank is inside the window
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| self.contains(idx + 1))
            .map(|(_, item)| item)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `null` logs to the console only
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_file() -> Option<String> {
    Some("./logs/last_run.log".to_string())
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportPaths {
    /// Output directory for content_<lang>.db
    #[serde(default = "default_export_dir")]
    pub dir: String,
    /// Directory holding preview .webp files
    #[serde(default)]
    pub preview_dir: Option<String>,
    /// SQLite source store
    #[serde(default = "default_source_db")]
    pub source_db: String,
    /// Write export_events.jsonl
    #[serde(default = "default_journal")]
    pub journal: bool,
}

fn default_export_dir() -> String {
    "export".to_string()
}

fn default_source_db() -> String {
    "source.db".to_string()
}

fn default_journal() -> bool {
    true
}

impl Default for ExportPaths {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
            preview_dir: None,
            source_db: default_source_db(),
            journal: default_journal(),
        }
    }
}

/// Resolved configuration with absolute paths and normalized languages
#[derive(Debug, Clone)]
pub struct Config {
    pub enabled: bool,
    pub range: RangeSettings,
    /// Trimmed, uppercased, deduplicated, in config order
    pub languages: Vec<String>,
    pub versions: Vec<String>,
    pub threads: usize,
    pub retry: RetryPolicy,
    pub logging: LoggingSettings,
    pub source_db: PathBuf,
    pub export_dir: PathBuf,
    pub preview_dir: PathBuf,
    pub journal: bool,
    /// Path to config file (if loaded from one)
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load and resolve a config file, applying environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = load_config_file(path)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut config = Self::resolve(raw, base, |key| std::env::var(key).ok())?;
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Resolve a parsed file against a base directory and an env lookup
    pub fn resolve(
        raw: ConfigFile,
        base: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if raw.threads == 0 {
            anyhow::bail!("threads must be greater than 0");
        }
        if raw.retry.max_attempts == 0 {
            anyhow::bail!("retry.attempts must be at least 1");
        }

        let mut languages: Vec<String> = Vec::new();
        for lang in &raw.languages {
            let lang = lang.trim().to_uppercase();
            if !lang.is_empty() && !languages.contains(&lang) {
                languages.push(lang);
            }
        }
        if languages.is_empty() {
            anyhow::bail!("config must include at least one language");
        }

        let versions = raw
            .versions
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        let export_dir = env("LIMA_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| resolve_path(base, &raw.export.dir));
        let preview_dir = match (env("LIMA_PREVIEW_DIR"), &raw.export.preview_dir) {
            (Some(dir), _) => PathBuf::from(dir),
            (None, Some(dir)) => resolve_path(base, dir),
            (None, None) => export_dir.join("daily_previews"),
        };
        let source_db = env("LIMA_SOURCE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| resolve_path(base, &raw.export.source_db));

        let logging = LoggingSettings {
            level: raw.logging.level.clone(),
            file: raw
                .logging
                .file
                .as_deref()
                .map(|f| resolve_path(base, f).to_string_lossy().into_owned()),
        };

        Ok(Self {
            enabled: raw.steps.get(STEP_NAME).copied().unwrap_or(true),
            range: raw.range,
            languages,
            versions,
            threads: raw.threads,
            retry: raw.retry,
            logging,
            source_db,
            export_dir,
            preview_dir,
            journal: raw.export.journal,
            config_file: None,
        })
    }

    /// Apply `--threads`
    pub fn with_threads(mut self, threads: Option<usize>) -> Result<Self> {
        if let Some(threads) = threads {
            if threads == 0 {
                anyhow::bail!("--threads must be greater than 0");
            }
            self.threads = threads;
        }
        Ok(self)
    }

    /// Apply `--language`: keep only the requested configured languages
    pub fn with_languages(mut self, only: &[String]) -> Result<Self> {
        if only.is_empty() {
            return Ok(self);
        }
        let wanted: Vec<String> = only.iter().map(|l| l.trim().to_uppercase()).collect();
        for lang in &wanted {
            if !self.languages.contains(lang) {
                anyhow::bail!("language {} is not configured", lang);
            }
        }
        self.languages.retain(|l| wanted.contains(l));
        Ok(self)
    }

    /// Output file for a language: `<export_dir>/content_<lang>.db`
    pub fn snapshot_path(&self, language: &str) -> PathBuf {
        snapshot_path(&self.export_dir, language)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.export_dir.join("export_events.jsonl")
    }
}

/// `<dir>/content_<lang>.db` with the language lowercased
pub fn snapshot_path(dir: &Path, language: &str) -> PathBuf {
    dir.join(format!("content_{}.db", language.to_lowercase()))
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
