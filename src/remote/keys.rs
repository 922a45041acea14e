//! Throwaway SSH key pairs
//!
//! Each run generates a fresh RSA key pair with `ssh-keygen`. The private key
//! lives in a temporary directory that is removed once the last clone of the
//! pair is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;

use crate::common::{Error, Result};

/// Generated key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// OpenSSH public key line, passed to templates as `ssh_key`
    pub public_key: String,
    private_key: PathBuf,
    _dir: Option<Arc<TempDir>>,
}

impl KeyPair {
    /// Generate an RSA key pair of `bits` bits
    pub async fn generate(keygen: &Path, bits: u32) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("validator-acceptance-")
            .tempdir()?;
        let private_key = dir.path().join("id_rsa");

        let output = Command::new(keygen)
            .args(["-q", "-t", "rsa", "-b"])
            .arg(bits.to_string())
            .args(["-N", "", "-C", "validator-acceptance", "-f"])
            .arg(&private_key)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Internal(format!("Failed to run ssh-keygen: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Internal(format!(
                "ssh-keygen failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let public_path = private_key.with_extension("pub");
        let public_key = std::fs::read_to_string(&public_path).map_err(|e| Error::FileRead {
            path: public_path.display().to_string(),
            error: e.to_string(),
        })?;

        tracing::debug!(bits, path = %private_key.display(), "Generated SSH key pair");

        Ok(Self {
            public_key: public_key.trim().to_string(),
            private_key,
            _dir: Some(Arc::new(dir)),
        })
    }

    /// Use an existing private key (for `check` against a running host)
    pub fn from_private_key(private_key: PathBuf) -> Result<Self> {
        if !private_key.exists() {
            return Err(Error::Config(format!(
                "SSH private key '{}' does not exist",
                private_key.display()
            )));
        }
        let public_path = private_key.with_extension("pub");
        let public_key = std::fs::read_to_string(&public_path)
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        Ok(Self {
            public_key,
            private_key,
            _dir: None,
        })
    }

    /// Path to the private key
    pub fn private_key(&self) -> &Path {
        &self.private_key
    }
}
