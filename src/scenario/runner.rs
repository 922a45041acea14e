//! Scenario runner
//!
//! Provisions the environment, reads the template outputs, runs every probe
//! through the retry executor and always destroys what it created.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use super::config::Scenario;
use crate::common::config::{CloudConfig, Config};
use crate::common::{Error, Result};
use crate::http::{BasicAuth, HttpChecker};
use crate::probes::{ProbeContext, ProbeSpec};
use crate::provision::{ProvisionOptions, Provisioner};
use crate::remote::{Host, KeyPair, RemoteExecutor};
use crate::retry::{do_with_retry, RetryPolicy};

/// Print a progress line labeled with the scenario name unless `$quiet`
macro_rules! say {
    ($quiet:expr, $scenario:expr, $($arg:tt)*) => {
        if !$quiet {
            println!("{}", progress_line(&$scenario, format_args!($($arg)*)));
        }
    };
}

/// The external capabilities a run depends on
#[derive(Clone)]
pub struct Backends {
    pub provisioner: Arc<dyn Provisioner>,
    pub remote: Arc<dyn RemoteExecutor>,
    pub http: Arc<dyn HttpChecker>,
}

/// Run-wide settings, resolved from configuration and CLI flags
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Directory holding the template directories
    pub templates_dir: PathBuf,
    /// Prefix of generated instance names
    pub instance_prefix: String,
    /// Default login user
    pub ssh_user: String,
    /// Default retry budget
    pub retry: RetryPolicy,
    /// Region list, region variable and credential environment
    pub cloud: CloudConfig,
    /// Region forced for every scenario
    pub region: Option<String>,
    /// Skip teardown after a failure
    pub keep_on_failure: bool,
    /// Print each probe's diagnostic message
    pub verbose: bool,
    /// Suppress progress output on stdout
    pub quiet: bool,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            templates_dir: config.terraform.templates_dir.clone(),
            instance_prefix: config.terraform.instance_prefix.clone(),
            ssh_user: config.ssh.user.clone(),
            retry: config.retry.policy(),
            cloud: config.cloud.clone(),
            region: None,
            keep_on_failure: config.terraform.keep_on_failure,
            verbose: false,
            quiet: false,
        }
    }

    fn pick_region(&self) -> Option<String> {
        self.region.clone().or_else(|| self.cloud.pick_region())
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub probes_passed: usize,
    pub probes_total: usize,
    /// Probe that was running when the scenario failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_probe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
    /// Environment left running for inspection
    pub kept: bool,
    pub elapsed_secs: f64,
}

/// How far a run got; survives a panic inside a probe
#[derive(Default)]
struct Progress {
    host: Option<String>,
    probes_passed: usize,
    current_probe: Option<&'static str>,
}

/// Runs scenarios against a fixed set of backends and one key pair
pub struct ScenarioRunner {
    settings: RunSettings,
    backends: Backends,
    key: KeyPair,
}

impl ScenarioRunner {
    pub fn new(settings: RunSettings, backends: Backends, key: KeyPair) -> Self {
        Self {
            settings,
            backends,
            key,
        }
    }

    /// Provision, probe and tear down one scenario
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let instance_name = format!("{}-{}", self.settings.instance_prefix, unique_id());
        let region = self.settings.pick_region();
        let opts = self.provision_options(scenario, &instance_name, region.as_deref());

        say!(
            self.settings.quiet,
            scenario.name,
            "{} {} ({} in {})",
            "Running Scenario:".blue().bold(),
            scenario.name.white().bold(),
            instance_name,
            region.as_deref().unwrap_or("default region")
        );
        if let Some(desc) = &scenario.description {
            say!(self.settings.quiet, scenario.name, "  {}", desc.dimmed());
        }

        let mut progress = Progress::default();
        let outcome = AssertUnwindSafe(self.provision_and_probe(scenario, &opts, &mut progress))
            .catch_unwind()
            .await;
        let result = flatten_panic(outcome, &progress);

        let kept = result.is_err() && self.settings.keep_on_failure;
        let teardown_error = if kept {
            warn!(
                scenario = %scenario.name,
                %instance_name,
                "Keeping failed environment; destroy it manually"
            );
            None
        } else {
            self.teardown(scenario, &opts).await
        };

        let failed_probe = failed_probe_name(&result, &progress);
        let report = ScenarioReport {
            name: scenario.name.clone(),
            passed: result.is_ok() && teardown_error.is_none(),
            instance_name: Some(instance_name),
            region,
            host: progress.host,
            probes_passed: progress.probes_passed,
            probes_total: scenario.probes.len(),
            failed_probe,
            error: result.err().map(|e| e.to_string()),
            teardown_error,
            kept,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        if !self.settings.quiet {
            print_outcome(&report);
        }
        report
    }

    /// Run a scenario's probes against a host that is already up
    pub async fn check_host(
        &self,
        scenario: &Scenario,
        host: Host,
        credentials: Option<BasicAuth>,
    ) -> ScenarioReport {
        let started = Instant::now();
        say!(
            self.settings.quiet,
            scenario.name,
            "{} {} against {}",
            "Checking Scenario:".blue().bold(),
            scenario.name.white().bold(),
            host
        );

        let mut progress = Progress {
            host: Some(host.hostname.clone()),
            ..Default::default()
        };
        let outcome = AssertUnwindSafe(self.run_probes(
            scenario,
            &host,
            credentials.as_ref(),
            &mut progress,
        ))
        .catch_unwind()
        .await;
        let result = flatten_panic(outcome, &progress);

        let failed_probe = failed_probe_name(&result, &progress);
        let report = ScenarioReport {
            name: scenario.name.clone(),
            passed: result.is_ok(),
            instance_name: None,
            region: None,
            host: progress.host,
            probes_passed: progress.probes_passed,
            probes_total: scenario.probes.len(),
            failed_probe,
            error: result.err().map(|e| e.to_string()),
            teardown_error: None,
            kept: false,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        if !self.settings.quiet {
            print_outcome(&report);
        }
        report
    }

    fn provision_options(
        &self,
        scenario: &Scenario,
        instance_name: &str,
        region: Option<&str>,
    ) -> ProvisionOptions {
        let mut vars = scenario.vars.clone();
        vars.insert("ssh_key".to_string(), self.key.public_key.clone());
        vars.insert("instance_name".to_string(), instance_name.to_string());

        let mut env: BTreeMap<String, String> = self.settings.cloud.env.clone();
        if let Some(region) = region {
            env.insert(self.settings.cloud.region_env.clone(), region.to_string());
        }

        ProvisionOptions {
            template_dir: self.settings.templates_dir.join(&scenario.template),
            vars,
            env,
        }
    }

    async fn provision_and_probe(
        &self,
        scenario: &Scenario,
        opts: &ProvisionOptions,
        progress: &mut Progress,
    ) -> Result<()> {
        say!(self.settings.quiet, scenario.name, "{}", "Provisioning:".cyan());
        self.backends.provisioner.init_and_apply(opts).await?;

        let provisioner = &self.backends.provisioner;
        let hostname = provisioner.output(opts, &scenario.outputs.host).await?;
        progress.host = Some(hostname.clone());
        say!(
            self.settings.quiet,
            scenario.name,
            "  {} {} is up at {}",
            "✓".green(),
            opts.template_name(),
            hostname
        );

        let credentials = if scenario.needs_credentials() {
            Some(self.read_credentials(scenario, opts).await?)
        } else {
            None
        };

        let user = scenario
            .ssh_user
            .clone()
            .unwrap_or_else(|| self.settings.ssh_user.clone());
        let host = Host::new(hostname, user, self.key.private_key().to_path_buf());

        self.run_probes(scenario, &host, credentials.as_ref(), progress)
            .await
    }

    async fn read_credentials(
        &self,
        scenario: &Scenario,
        opts: &ProvisionOptions,
    ) -> Result<BasicAuth> {
        let (Some(user_output), Some(password_output)) = (
            scenario.outputs.http_username.as_deref(),
            scenario.outputs.http_password.as_deref(),
        ) else {
            return Err(Error::MissingCredentials {
                probe: "metrics-endpoint".to_string(),
            });
        };

        let provisioner = &self.backends.provisioner;
        Ok(BasicAuth {
            username: provisioner.output(opts, user_output).await?,
            password: provisioner.output(opts, password_output).await?,
        })
    }

    async fn run_probes(
        &self,
        scenario: &Scenario,
        host: &Host,
        credentials: Option<&BasicAuth>,
        progress: &mut Progress,
    ) -> Result<()> {
        let policy = scenario.retry_policy(self.settings.retry);
        let ctx = ProbeContext {
            host,
            remote: self.backends.remote.as_ref(),
            http: self.backends.http.as_ref(),
            credentials,
        };
        let ctx = &ctx;

        say!(self.settings.quiet, scenario.name, "{}", "Probes:".cyan());
        for (i, probe) in scenario.probes.iter().enumerate() {
            progress.current_probe = Some(probe.name());
            let description = probe.description(host);
            info!(scenario = %scenario.name, probe = probe.name(), "{}", description);

            match do_with_retry(&policy, &description, || probe.check(ctx)).await {
                Ok(message) => {
                    progress.probes_passed += 1;
                    if !self.settings.quiet {
                        print_probe_passed(&scenario.name, i + 1, probe, &message, self.settings.verbose);
                    }
                }
                Err(e) => {
                    say!(
                        self.settings.quiet,
                        scenario.name,
                        "  {} Probe {} ({}): {}",
                        "✗".red(),
                        i + 1,
                        probe.name(),
                        e
                    );
                    return Err(e);
                }
            }
        }
        progress.current_probe = None;
        Ok(())
    }

    async fn teardown(&self, scenario: &Scenario, opts: &ProvisionOptions) -> Option<String> {
        say!(self.settings.quiet, scenario.name, "{}", "Teardown:".cyan());
        match self.backends.provisioner.destroy(opts).await {
            Ok(()) => {
                say!(
                    self.settings.quiet,
                    scenario.name,
                    "  {} {} destroyed",
                    "✓".green(),
                    opts.template_name()
                );
                None
            }
            Err(e) => {
                error!(scenario = %scenario.name, error = %e, "Teardown failed; resources may be left behind");
                say!(self.settings.quiet, scenario.name, "  {} {}", "✗".red(), e);
                Some(e.to_string())
            }
        }
    }
}

/// Run scenarios concurrently, one task each.
///
/// Reports come back in the order the scenarios were given. A scenario name
/// given twice runs once, since both runs would share one template state.
pub async fn run_suite(
    runner: Arc<ScenarioRunner>,
    scenarios: Vec<Scenario>,
) -> Vec<ScenarioReport> {
    let mut seen = HashSet::new();
    let mut meta = Vec::new();
    let mut handles = Vec::new();

    for scenario in scenarios {
        if !seen.insert(scenario.name.clone()) {
            warn!(scenario = %scenario.name, "Scenario listed twice; running it once");
            continue;
        }
        meta.push((scenario.name.clone(), scenario.probes.len()));
        let runner = runner.clone();
        handles.push(tokio::spawn(async move { runner.run(&scenario).await }));
    }

    join_all(handles)
        .await
        .into_iter()
        .zip(meta)
        .map(|(joined, (name, probes_total))| {
            joined.unwrap_or_else(|e| ScenarioReport {
                name,
                passed: false,
                instance_name: None,
                region: None,
                host: None,
                probes_passed: 0,
                probes_total,
                failed_probe: None,
                error: Some(format!("scenario task failed: {}", e)),
                teardown_error: None,
                kept: false,
                elapsed_secs: 0.0,
            })
        })
        .collect()
}

fn flatten_panic(
    outcome: std::thread::Result<Result<()>>,
    progress: &Progress,
) -> Result<()> {
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::ProbePanicked {
                probe: progress.current_probe.unwrap_or("provisioning").to_string(),
                message,
            })
        }
    }
}

fn failed_probe_name(result: &Result<()>, progress: &Progress) -> Option<String> {
    match result {
        Err(_) => progress.current_probe.map(str::to_string),
        Ok(()) => None,
    }
}

fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Prefix a progress line with its scenario, so concurrent runs stay readable
fn progress_line(scenario: &str, text: std::fmt::Arguments<'_>) -> String {
    format!("{} {}", format!("[{}]", scenario).dimmed(), text)
}

fn print_probe_passed(scenario: &str, step: usize, probe: &ProbeSpec, message: &str, verbose: bool) {
    let line = if verbose {
        progress_line(
            scenario,
            format_args!(
                "  {} Probe {}: {} ({})",
                "✓".green(),
                step,
                probe.name(),
                message.dimmed()
            ),
        )
    } else {
        progress_line(
            scenario,
            format_args!("  {} Probe {}: {}", "✓".green(), step, probe.name()),
        )
    };
    println!("{}", line);
}

fn print_outcome(report: &ScenarioReport) {
    if report.passed {
        println!(
            "\n{} {} {}\n",
            "✓".green().bold(),
            report.name.white().bold(),
            "passed".green().bold()
        );
    } else {
        println!(
            "\n{} {} {} ({}/{} probes passed)\n",
            "✗".red().bold(),
            report.name.white().bold(),
            "failed".red().bold(),
            report.probes_passed,
            report.probes_total
        );
    }
}
