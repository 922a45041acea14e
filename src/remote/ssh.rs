//! Remote execution through the OpenSSH client

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

use super::{Host, RemoteExecutor};
use crate::common::{trim_output, truncate, Error, Result};

/// Exit status ssh uses for its own failures (as opposed to the command's)
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Executes commands with the system `ssh` binary
pub struct SshExecutor {
    binary: PathBuf,
    connect_timeout: Duration,
}

impl SshExecutor {
    pub fn new(binary: PathBuf, connect_timeout: Duration) -> Self {
        Self {
            binary,
            connect_timeout,
        }
    }

    /// Arguments placed before the remote command.
    ///
    /// Freshly provisioned hosts have unknown host keys, and a run must never
    /// block on a prompt.
    fn connection_args(&self, host: &Host) -> Vec<String> {
        vec![
            "-i".to_string(),
            host.private_key.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            format!("{}@{}", host.user, host.hostname),
            "--".to_string(),
        ]
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, host: &Host, command: &str) -> Result<String> {
        trace!(%host, %command, "ssh");

        let output = Command::new(&self.binary)
            .args(self.connection_args(host))
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::RemoteConnection {
                host: host.hostname.clone(),
                message: format!("failed to run {}: {}", self.binary.display(), e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            Some(0) => Ok(trim_output(&String::from_utf8_lossy(&output.stdout))),
            Some(SSH_CONNECTION_FAILURE) | None => Err(Error::RemoteConnection {
                host: host.hostname.clone(),
                message: truncate(stderr.trim(), 500),
            }),
            Some(status) => Err(Error::RemoteCommand {
                command: command.to_string(),
                status,
                stderr: truncate(stderr.trim(), 500),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_args_end_with_target() {
        let executor = SshExecutor::new(PathBuf::from("ssh"), Duration::from_secs(10));
        let host = Host::new("198.51.100.4", "ubuntu", PathBuf::from("/keys/id_rsa"));
        let args = executor.connection_args(&host);

        assert_eq!(args[0], "-i");
        assert_eq!(args[1], "/keys/id_rsa");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert_eq!(args[args.len() - 2], "ubuntu@198.51.100.4");
        assert_eq!(args[args.len() - 1], "--");
    }

    #[tokio::test]
    async fn test_missing_binary_is_connection_error() {
        let executor = SshExecutor::new(
            PathBuf::from("/nonexistent/ssh"),
            Duration::from_secs(1),
        );
        let host = Host::new("198.51.100.4", "ubuntu", PathBuf::from("/keys/id_rsa"));

        let err = executor.run(&host, "true").await.unwrap_err();
        assert!(matches!(err, Error::RemoteConnection { .. }));
        assert!(err.is_retryable());
    }
}
