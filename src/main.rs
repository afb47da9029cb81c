//! lima-export CLI entrypoint

use anyhow::Result;
use clap::Parser;

use lima_export::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is initialized per command, once the config is known
    let cli = Cli::parse();
    cli.execute().await
}
