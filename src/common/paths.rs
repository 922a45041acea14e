//! Configuration, log and key locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/validator-acceptance/`
//! - macOS: `~/Library/Application Support/validator-acceptance/`
//! - Windows: `%APPDATA%\validator-acceptance\`

use std::io;
use std::path::PathBuf;

/// Application directory name
const APP_NAME: &str = "validator-acceptance";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Get the path to the run log file
pub fn run_log_path() -> Option<PathBuf> {
    log_dir().map(|d| d.join("runs.log"))
}

/// Ensure the log directory exists
pub fn ensure_log_dir() -> io::Result<Option<PathBuf>> {
    if let Some(dir) = log_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }

    #[test]
    fn test_run_log_lives_in_log_dir() {
        if let (Some(log), Some(dir)) = (run_log_path(), log_dir()) {
            assert!(log.starts_with(dir));
        }
    }
}
