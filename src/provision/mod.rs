//! Environment provisioning
//!
//! Defines the narrow capability the scenario runner needs from an
//! infrastructure tool: create an environment from a template, read its
//! outputs back, and destroy it.

pub mod terraform;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::common::Result;

pub use terraform::TerraformProvisioner;

/// Everything needed to drive one template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Template directory
    pub template_dir: PathBuf,
    /// Input variables (`-var name=value`)
    pub vars: BTreeMap<String, String>,
    /// Environment for the provisioning tool (region, credentials)
    pub env: BTreeMap<String, String>,
}

impl ProvisionOptions {
    /// Template name used in log lines and errors
    pub fn template_name(&self) -> String {
        self.template_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.template_dir.display().to_string())
    }
}

/// Capability to create and destroy environments
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Initialise the template and create the environment
    async fn init_and_apply(&self, opts: &ProvisionOptions) -> Result<()>;

    /// Read a declared output of the applied template
    async fn output(&self, opts: &ProvisionOptions, name: &str) -> Result<String>;

    /// Destroy everything the template created
    async fn destroy(&self, opts: &ProvisionOptions) -> Result<()>;
}
