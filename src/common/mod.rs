//! Common utilities shared across the suite

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Trim a remote command's output the way probes compare it.
pub fn trim_output(raw: &str) -> String {
    raw.trim_end_matches(['\n', '\r']).trim().to_string()
}

/// Shorten long diagnostic text for one-line reports
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
