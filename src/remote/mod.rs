//! Remote shell access to provisioned hosts

pub mod keys;
pub mod ssh;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

use crate::common::Result;

pub use keys::KeyPair;
pub use ssh::SshExecutor;

/// Connection descriptor built from template outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Public address of the machine
    pub hostname: String,
    /// Login user
    pub user: String,
    /// Private key used to authenticate
    pub private_key: PathBuf,
}

impl Host {
    pub fn new(hostname: impl Into<String>, user: impl Into<String>, private_key: PathBuf) -> Self {
        Self {
            hostname: hostname.into(),
            user: user.into(),
            private_key,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.hostname)
    }
}

/// Capability to run shell commands on a host
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on `host` and return its trimmed stdout.
    ///
    /// A non-zero exit status is an error.
    async fn run(&self, host: &Host, command: &str) -> Result<String>;
}
