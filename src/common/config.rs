//! Configuration file handling
//!
//! Cloud region and credentials, the retry budget and tool locations are
//! read from here and passed to the runner explicitly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};
use crate::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Cloud region and credential settings
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Default retry budget for every probe
    #[serde(default)]
    pub retry: RetrySettings,

    /// SSH settings
    #[serde(default)]
    pub ssh: SshConfig,

    /// Terraform settings
    #[serde(default)]
    pub terraform: TerraformConfig,

    /// HTTP probe settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Cloud region and credential settings
#[derive(Debug, Deserialize, Clone)]
pub struct CloudConfig {
    /// Regions a scenario may be deployed to; one is picked per scenario
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,

    /// Environment variable the templates read the region from
    #[serde(default = "default_region_env")]
    pub region_env: String,

    /// Extra environment passed to terraform (profiles, credentials)
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            region_env: default_region_env(),
            env: BTreeMap::new(),
        }
    }
}

fn default_regions() -> Vec<String> {
    [
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-west-2",
        "eu-central-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-south-1",
        "ca-central-1",
        "sa-east-1",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

fn default_region_env() -> String {
    "AWS_DEFAULT_REGION".to_string()
}

impl CloudConfig {
    /// Pick a region for one scenario run.
    ///
    /// Spreading runs over regions catches templates that only work in one.
    pub fn pick_region(&self) -> Option<String> {
        if self.regions.is_empty() {
            return None;
        }
        let index = (uuid::Uuid::new_v4().as_u128() % self.regions.len() as u128) as usize;
        Some(self.regions[index].clone())
    }
}

/// Retry budget in config-file form
#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    /// Attempts per probe
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds between attempts
    #[serde(default = "default_delay")]
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    30
}
fn default_delay() -> u64 {
    30
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

/// SSH settings
#[derive(Debug, Deserialize, Clone)]
pub struct SshConfig {
    /// Default login user for provisioned hosts
    #[serde(default = "default_ssh_user")]
    pub user: String,

    /// RSA key size for generated key pairs
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,

    /// Connect timeout passed to ssh
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Explicit path to the ssh binary (searched in PATH otherwise)
    pub binary: Option<PathBuf>,

    /// Explicit path to ssh-keygen (searched in PATH otherwise)
    pub keygen_binary: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            key_bits: default_key_bits(),
            connect_timeout_secs: default_connect_timeout(),
            binary: None,
            keygen_binary: None,
        }
    }
}

pub(crate) fn default_ssh_user() -> String {
    "ubuntu".to_string()
}
fn default_key_bits() -> u32 {
    2048
}
fn default_connect_timeout() -> u64 {
    10
}

/// Terraform settings
#[derive(Debug, Deserialize, Clone)]
pub struct TerraformConfig {
    /// Explicit path to the terraform binary (searched in PATH otherwise)
    pub binary: Option<PathBuf>,

    /// Directory containing one template directory per scenario
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Prefix for generated instance names
    #[serde(default = "default_instance_prefix")]
    pub instance_prefix: String,

    /// Leave failed environments running for inspection
    #[serde(default)]
    pub keep_on_failure: bool,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: None,
            templates_dir: default_templates_dir(),
            instance_prefix: default_instance_prefix(),
            keep_on_failure: false,
        }
    }
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}
fn default_instance_prefix() -> String {
    "terratest".to_string()
}

/// HTTP probe settings
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from an explicit path or the default config file
    ///
    /// Returns default configuration if no file exists. An explicit path that
    /// does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve the terraform binary
    pub fn terraform_binary(&self) -> Result<PathBuf> {
        resolve_tool(self.terraform.binary.as_deref(), "terraform")
    }

    /// Resolve the ssh binary
    pub fn ssh_binary(&self) -> Result<PathBuf> {
        resolve_tool(self.ssh.binary.as_deref(), "ssh")
    }

    /// Resolve the ssh-keygen binary
    pub fn keygen_binary(&self) -> Result<PathBuf> {
        resolve_tool(self.ssh.keygen_binary.as_deref(), "ssh-keygen")
    }
}

fn resolve_tool(explicit: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    which::which(name).map_err(|_| Error::ToolNotFound(name.to_string()))
}
