//! Terraform provisioner
//!
//! Shells out to the terraform binary with the template directory as the
//! working directory. Variables are passed on the command line so no
//! tfvars files are written next to the templates.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ProvisionOptions, Provisioner};
use crate::common::{trim_output, truncate, Error, Result};

/// Longest stderr excerpt carried in an error
const STDERR_EXCERPT: usize = 2000;

/// Provisioner backed by the terraform CLI
pub struct TerraformProvisioner {
    binary: PathBuf,
}

impl TerraformProvisioner {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Build the argument list for a command that takes input variables
    fn args_with_vars(subcommand: &str, opts: &ProvisionOptions) -> Vec<String> {
        let mut args = vec![
            subcommand.to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
            "-no-color".to_string(),
        ];
        for (name, value) in &opts.vars {
            args.push("-var".to_string());
            args.push(format!("{}={}", name, value));
        }
        args
    }

    async fn run(&self, opts: &ProvisionOptions, args: &[String]) -> Result<String> {
        debug!(
            template = %opts.template_name(),
            command = %args.first().map(String::as_str).unwrap_or(""),
            "Running terraform"
        );

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&opts.template_dir)
            .envs(&opts.env)
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::provision(
                    &opts.template_name(),
                    format!("failed to run {}: {}", self.binary.display(), e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::provision(
                &opts.template_name(),
                format!(
                    "terraform {} exited with {:?}: {}",
                    args.first().map(String::as_str).unwrap_or(""),
                    output.status.code(),
                    truncate(stderr.trim(), STDERR_EXCERPT)
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Provisioner for TerraformProvisioner {
    async fn init_and_apply(&self, opts: &ProvisionOptions) -> Result<()> {
        info!(template = %opts.template_name(), "terraform init");
        self.run(
            opts,
            &[
                "init".to_string(),
                "-input=false".to_string(),
                "-no-color".to_string(),
            ],
        )
        .await?;

        info!(template = %opts.template_name(), "terraform apply");
        self.run(opts, &Self::args_with_vars("apply", opts)).await?;
        Ok(())
    }

    async fn output(&self, opts: &ProvisionOptions, name: &str) -> Result<String> {
        let raw = self
            .run(
                opts,
                &[
                    "output".to_string(),
                    "-no-color".to_string(),
                    "-raw".to_string(),
                    name.to_string(),
                ],
            )
            .await
            .map_err(|e| match e {
                Error::Provision { template, message } => Error::Provision {
                    template,
                    message: format!("reading output '{}': {}", name, message),
                },
                other => other,
            })?;

        let value = trim_output(&raw);
        if value.is_empty() {
            return Err(Error::MissingOutput {
                name: name.to_string(),
            });
        }
        Ok(value)
    }

    async fn destroy(&self, opts: &ProvisionOptions) -> Result<()> {
        info!(template = %opts.template_name(), "terraform destroy");
        self.run(opts, &Self::args_with_vars("destroy", opts))
            .await
            .map(|_| ())
            .map_err(|e| Error::Teardown {
                template: opts.template_name(),
                message: e.to_string(),
            })
    }
}
