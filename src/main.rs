//! Validator Acceptance - deployment acceptance tests for validator templates
//!
//! Provisions each scenario's template, probes the resulting host until it
//! converges and destroys the environment afterwards.

use clap::Parser;
use std::path::PathBuf;
use validator_acceptance::commands::Commands;
use validator_acceptance::common::{config::Config, logging};
use validator_acceptance::{cli, Error};

#[derive(Parser)]
#[command(
    name = "validator-acceptance",
    about = "Acceptance tests for validator deployment templates"
)]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: the per-user config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Do not append to the run log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_to_file = !cli.no_log_file && matches!(cli.command, Commands::Run { .. });
    if let Some(path) = logging::init_cli(log_to_file) {
        tracing::debug!(path = %path.display(), "Appending to run log");
    }

    let result = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {}
        // Per-scenario errors were already reported
        Err(e @ Error::ScenariosFailed { .. }) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
