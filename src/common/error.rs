//! Error types for the acceptance suite
//!
//! Each variant tells the retry executor whether another attempt could
//! change the outcome. Messages name the failing check so a red CI log is
//! actionable without re-running the suite.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the acceptance suite
#[derive(Error, Debug)]
pub enum Error {
    // === Provisioning Errors ===
    #[error("Provisioning failed in '{template}': {message}")]
    Provision { template: String, message: String },

    #[error("Template output '{name}' is missing or empty")]
    MissingOutput { name: String },

    #[error("Teardown of '{template}' failed: {message}")]
    Teardown { template: String, message: String },

    // === Remote Errors ===
    #[error("Could not reach {host}: {message}")]
    RemoteConnection { host: String, message: String },

    #[error("Remote command '{command}' failed (exit {status}): {stderr}")]
    RemoteCommand {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("HTTP check of {url} failed: {message}")]
    Http { url: String, message: String },

    // === Probe Errors ===
    #[error("Probe '{probe}' failed: {message}")]
    ProbeFailed { probe: String, message: String },

    #[error("Could not parse '{input}' as {expected}")]
    Parse { input: String, expected: String },

    #[error("Probe '{probe}' needs HTTP credentials but the template exposes none")]
    MissingCredentials { probe: String },

    #[error("Probe '{probe}' panicked: {message}")]
    ProbePanicked { probe: String, message: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid scenario file '{path}': {message}")]
    ScenarioParse { path: String, message: String },

    #[error("Unknown scenario '{0}'. Use 'validator-acceptance list' to see available scenarios")]
    UnknownScenario(String),

    #[error("Required tool '{0}' was not found in PATH")]
    ToolNotFound(String),

    #[error("No scenario selected. Name one, pass --all or --file")]
    NoScenarios,

    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a probe assertion failure
    pub fn probe_failed(probe: &str, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            probe: probe.to_string(),
            message: message.into(),
        }
    }

    /// Create a parse failure for a remote response
    pub fn parse(input: &str, expected: &str) -> Self {
        Self::Parse {
            input: input.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create a provisioning failure
    pub fn provision(template: &str, message: impl Into<String>) -> Self {
        Self::Provision {
            template: template.to_string(),
            message: message.into(),
        }
    }

    /// Create an HTTP failure
    pub fn http(url: &str, message: impl Into<String>) -> Self {
        Self::Http {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// A host that is still booting refuses connections, cloud-init may not
    /// have installed packages yet, and a snapshot may still be downloading.
    /// A response we cannot parse or a broken scenario will not get better.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RemoteConnection { .. }
                | Error::RemoteCommand { .. }
                | Error::Http { .. }
                | Error::ProbeFailed { .. }
        )
    }
}
