//! Main entry point for the quorlock command line tool.

use clap::Parser;
use quorlock_cli::{Cli, Configuration, commands, metrics, startup};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::from_cli(&cli)?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    metrics::init_metrics();

    if let Err(e) = commands::run(&cli.command, &configuration).await {
        error!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}
