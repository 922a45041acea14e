//! Logging and tracing configuration
//!
//! Scenario runs take tens of minutes, so besides the compact stderr output
//! every run is also appended to a log file for later inspection.

use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
/// Returns the log file path when file logging could be set up.
pub fn init_cli(log_to_file: bool) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("validator_acceptance=info,warn"));

    if log_to_file {
        if let Some(log_file) = open_run_log() {
            let (path, file) = log_file;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_thread_ids(false)
                        .compact(),
                )
                .init();

            return Some(path);
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();

    None
}

fn open_run_log() -> Option<(PathBuf, std::fs::File)> {
    match paths::ensure_log_dir() {
        Ok(Some(_)) => {}
        Ok(None) => return None,
        Err(e) => {
            eprintln!("Warning: Could not create log directory: {}", e);
            return None;
        }
    }

    let path = paths::run_log_path()?;
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            None
        }
    }
}
