//! CLI command definitions
//!
//! Defines the clap commands for the acceptance suite.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Provision, probe and destroy one or more scenarios
    Run {
        /// Built-in scenarios to run
        names: Vec<String>,

        /// Run every built-in scenario
        #[arg(long, conflicts_with = "names")]
        all: bool,

        /// Scenario YAML file to run (can be specified multiple times)
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,

        /// Region for every scenario instead of a random one
        #[arg(long)]
        region: Option<String>,

        /// Attempts per probe before giving up
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds between attempts
        #[arg(long)]
        delay_secs: Option<u64>,

        /// Leave a failed scenario's environment running for inspection
        #[arg(long)]
        keep: bool,

        /// Output reports as JSON
        #[arg(long)]
        json: bool,

        /// Print each probe's diagnostic message
        #[arg(long, short)]
        verbose: bool,
    },

    /// List built-in scenarios
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a built-in scenario as YAML
    Show {
        /// Scenario name
        name: String,
    },

    /// Run a scenario's probes against a host that is already running
    Check {
        /// Built-in scenario name, or a path to a scenario YAML file
        scenario: String,

        /// Address of the host
        #[arg(long)]
        host: String,

        /// Private key to log in with
        #[arg(long)]
        key: PathBuf,

        /// Login user (default: the scenario's, then the configured one)
        #[arg(long)]
        user: Option<String>,

        /// Basic-auth user for authenticated endpoints
        #[arg(long)]
        http_username: Option<String>,

        /// Basic-auth password for authenticated endpoints
        #[arg(long)]
        http_password: Option<String>,

        /// Attempts per probe before giving up
        #[arg(long, default_value = "1")]
        max_attempts: u32,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}
