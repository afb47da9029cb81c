//! Command-line interface for lima-export.
//!
//! Provides commands for running the export, inspecting the latest run
//! from the journal, and printing the resolved configuration.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{Config, LoggingSettings};
use crate::core::{load_tree, JobOutcome, JobRunner, JobState, Journal, RunSummary};
use crate::logging;

/// lima-export - per-language content snapshot exporter
#[derive(Parser, Debug)]
#[command(name = "lima-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline config file
    #[arg(short, long, global = true, env = "LIMA_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one snapshot per configured language
    Export {
        /// Worker pool size (overrides `threads`)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Only export these configured languages (repeatable)
        #[arg(short, long = "language")]
        languages: Vec<String>,

        /// Build the content tree and show the plan without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the outcome of the latest run from the journal
    Status,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Export {
                threads,
                languages,
                dry_run,
            } => export(&self.config, threads, &languages, dry_run).await,
            Commands::Status => show_status(&self.config).await,
            Commands::Config => show_config(&self.config),
        }
    }
}

/// Run the export step
async fn export(
    config_path: &Path,
    threads: Option<usize>,
    languages: &[String],
    dry_run: bool,
) -> Result<()> {
    let config = Config::load(config_path)?
        .with_threads(threads)?
        .with_languages(languages)?;
    logging::init(&config.logging)?;

    if !config.enabled {
        info!(step = crate::config::STEP_NAME, "Step disabled in config, skipping export");
        return Ok(());
    }

    info!(
        source = %config.source_db.display(),
        export_dir = %config.export_dir.display(),
        languages = ?config.languages,
        threads = config.threads,
        "Export step started"
    );

    let tree = load_tree(&config)
        .await
        .with_context(|| format!("Failed to load source: {}", config.source_db.display()))?;

    if tree.is_empty() {
        warn!(reason = "no_data", "Content tree is empty, no jobs scheduled");
        return Ok(());
    }

    if dry_run {
        print_plan(&config, &tree.stats());
        return Ok(());
    }

    let runner = JobRunner::new(&config);
    install_shutdown_handler(runner.shutdown_handle());

    let summary = runner.run(Arc::new(tree), &config.languages).await;
    print_summary(&summary);

    let failed: Vec<&str> = summary.failed().map(|j| j.language.as_str()).collect();
    if !failed.is_empty() {
        anyhow::bail!("Export failed for: {}", failed.join(", "));
    }
    Ok(())
}

/// First Ctrl-C requests a graceful shutdown
fn install_shutdown_handler(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown requested, pending jobs will be skipped");
            flag.store(true, Ordering::Relaxed);
        }
    });
}

fn print_plan(config: &Config, stats: &crate::domain::TreeStats) {
    println!("Dry run: nothing written");
    println!(
        "Tree: {} categories, {} subcategories, {} coaches, {} affirmations",
        stats.categories, stats.subcategories, stats.coaches, stats.affirmations
    );
    println!("Jobs ({} at a time):", config.threads);
    for language in &config.languages {
        println!("  {:<4} -> {}", language, config.snapshot_path(language).display());
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run ID: {}", summary.run_id);
    println!("{:<6} {:<10} {:>10} {:>13} {:>8}", "LANG", "STATE", "CATEGORIES", "AFFIRMATIONS", "DROPPED");
    println!("{}", "-".repeat(52));

    for job in &summary.jobs {
        match &job.outcome {
            JobOutcome::Completed(report) => {
                let d = report.dropped;
                println!(
                    "{:<6} {:<10} {:>10} {:>13} {:>8}",
                    job.language,
                    "completed",
                    report.snapshot.counts.categories,
                    report.snapshot.counts.affirmations,
                    d.categories + d.subcategories + d.missing_script + d.missing_subtitle
                );
            }
            JobOutcome::Failed { error, attempts } => {
                println!("{:<6} {:<10} after {} attempt(s): {}", job.language, "failed", attempts, error);
            }
            JobOutcome::Skipped => println!("{:<6} {:<10}", job.language, "skipped"),
        }
    }
    println!("Elapsed: {:.1}s", summary.progress.elapsed.as_secs_f64());
}

/// Show the latest run recorded in the journal
async fn show_status(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    logging::init(&LoggingSettings {
        file: None,
        ..config.logging.clone()
    })?;

    let journal = Journal::new(config.journal_path());
    let Some(run) = journal.latest_run().await? else {
        println!("No runs found in {}", journal.path().display());
        return Ok(());
    };

    println!("Run ID:  {}", run.run_id);
    println!("Started: {}", run.started_at);
    println!();
    println!("{:<6} {:<10} {:>8} {:>10} {:>13}", "LANG", "STATE", "ATTEMPTS", "CATEGORIES", "AFFIRMATIONS");
    println!("{}", "-".repeat(51));
    for (language, status) in &run.languages {
        let state = match &status.state {
            JobState::Running => "running",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
            JobState::Skipped => "skipped",
        };
        println!(
            "{:<6} {:<10} {:>8} {:>10} {:>13}",
            language,
            state,
            status.attempts,
            format!("{}/{}", status.categories_done, status.categories_total),
            status.affirmations
        );
        match &status.state {
            JobState::Failed { error } => println!("       error: {}", error),
            JobState::Completed { digest: Some(digest) } => println!("       digest: {}", digest),
            _ => {}
        }
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(config_path: &Path) -> Result<()> {
    let cfg = Config::load(config_path)?;

    println!("Config file: {}", config_path.display());
    println!("Step enabled: {}", cfg.enabled);
    println!();
    println!("Paths:");
    println!("  Source db:    {}", cfg.source_db.display());
    println!("  Export dir:   {}", cfg.export_dir.display());
    println!("  Previews:     {}", cfg.preview_dir.display());
    println!(
        "  Journal:      {}",
        if cfg.journal {
            cfg.journal_path().display().to_string()
        } else {
            "(disabled)".to_string()
        }
    );
    println!();
    println!("Languages: {}", cfg.languages.join(", "));
    println!(
        "Versions:  {}",
        if cfg.versions.is_empty() {
            "(none - no coaches will be exported)".to_string()
        } else {
            cfg.versions.join(", ")
        }
    );
    println!("Threads:   {}", cfg.threads);
    println!();
    println!("Range:");
    for (name, window) in [
        ("categories", cfg.range.categories),
        ("subcategories", cfg.range.subcategories),
        ("positions", cfg.range.positions),
    ] {
        println!("  {:<14} [{}, {}]", name, window.start, window.end);
    }
    println!();
    println!("Retry:");
    println!("  Attempts: {}", cfg.retry.max_attempts);
    println!("  Delays:   {:?}s", cfg.retry.delays_sec);
    println!();
    println!("Logging:");
    println!("  Level: {}", cfg.logging.level);
    println!("  File:  {}", cfg.logging.file.as_deref().unwrap_or("(console only)"));

    Ok(())
}
