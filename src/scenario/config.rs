//! Scenario definitions
//!
//! Defines the data structures for deserializing YAML scenarios. The built-in
//! scenarios use the same types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::{Error, Result};
use crate::probes::ProbeSpec;
use crate::retry::RetryPolicy;

/// A complete deployment scenario
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template directory, relative to the templates directory
    pub template: PathBuf,
    /// Extra template variables besides `ssh_key` and `instance_name`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    /// Names of the template outputs to read back
    #[serde(default)]
    pub outputs: OutputNames,
    /// Login user, overriding the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_user: Option<String>,
    /// Retry budget, overriding the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryOverride>,
    /// Probes to run, in order
    pub probes: Vec<ProbeSpec>,
}

/// Template output names
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    /// Output holding the public address
    #[serde(default = "default_host_output")]
    pub host: String,
    /// Output holding the HTTP basic-auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_username: Option<String>,
    /// Output holding the HTTP basic-auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_password: Option<String>,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            host: default_host_output(),
            http_username: None,
            http_password: None,
        }
    }
}

fn default_host_output() -> String {
    "public_ip".to_string()
}

/// Per-scenario retry budget
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<u64>,
}

impl RetryOverride {
    /// Apply this override on top of `base`
    pub fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            delay: self
                .delay_secs
                .map(Duration::from_secs)
                .unwrap_or(base.delay),
        }
    }
}

impl Scenario {
    /// Load a scenario from a YAML file.
    ///
    /// A relative template path is resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let mut scenario = Self::from_yaml(&content).map_err(|e| Error::ScenarioParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if scenario.template.is_relative() {
            let dir = path.parent().unwrap_or(Path::new("."));
            scenario.template = dir.join(&scenario.template);
        }
        Ok(scenario)
    }

    /// Parse and validate a scenario from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check the scenario is runnable before provisioning anything
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("scenario name must not be empty".to_string()));
        }
        if self.probes.is_empty() {
            return Err(Error::Config(format!(
                "scenario '{}' has no probes",
                self.name
            )));
        }
        for reserved in ["ssh_key", "instance_name"] {
            if self.vars.contains_key(reserved) {
                return Err(Error::Config(format!(
                    "scenario '{}' must not set '{}'; it is generated per run",
                    self.name, reserved
                )));
            }
        }
        for probe in &self.probes {
            if let ProbeSpec::DiskSize {
                mount,
                min,
                max: Some(max),
            } = probe
            {
                if max < min {
                    return Err(Error::Config(format!(
                        "scenario '{}': disk_size bound for {} has max {} below min {}",
                        self.name, mount, max, min
                    )));
                }
            }
        }
        if self.needs_credentials()
            && (self.outputs.http_username.is_none() || self.outputs.http_password.is_none())
        {
            return Err(Error::Config(format!(
                "scenario '{}' has an authenticated probe but no http_username/http_password outputs",
                self.name
            )));
        }
        Ok(())
    }

    /// Whether any probe reads HTTP credentials
    pub fn needs_credentials(&self) -> bool {
        self.probes.iter().any(ProbeSpec::needs_credentials)
    }

    /// Retry budget for this scenario
    pub fn retry_policy(&self, base: RetryPolicy) -> RetryPolicy {
        self.retry.map(|r| r.apply(base)).unwrap_or(base)
    }
}
