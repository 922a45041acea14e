//! CLI command handling
//!
//! Wires the real backends into the scenario runner and formats reports.

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{truncate, Error, Result};
use crate::http::{BasicAuth, ReqwestChecker};
use crate::provision::TerraformProvisioner;
use crate::remote::{Host, KeyPair, SshExecutor};
use crate::retry::RetryPolicy;
use crate::scenario::{
    builtin_scenarios, find_builtin, run_suite, Backends, RunSettings, Scenario, ScenarioReport,
    ScenarioRunner,
};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Run {
            names,
            all,
            files,
            region,
            max_attempts,
            delay_secs,
            keep,
            json,
            verbose,
        } => {
            let scenarios = select_scenarios(&names, all, &files)?;

            let mut settings = RunSettings::from_config(&config);
            if let Some(n) = max_attempts {
                settings.retry.max_attempts = n;
            }
            if let Some(secs) = delay_secs {
                settings.retry.delay = Duration::from_secs(secs);
            }
            settings.region = region;
            settings.keep_on_failure |= keep;
            settings.verbose = verbose;
            settings.quiet = json;

            let backends = real_backends(&config, config.terraform_binary()?)?;
            let key = KeyPair::generate(&config.keygen_binary()?, config.ssh.key_bits).await?;
            tracing::info!(
                scenarios = scenarios.len(),
                max_attempts = settings.retry.max_attempts,
                delay_secs = settings.retry.delay.as_secs(),
                "Starting acceptance run"
            );

            let runner = Arc::new(ScenarioRunner::new(settings, backends, key));
            let reports = run_suite(runner, scenarios).await;
            report_outcome(&reports, json)
        }

        Commands::List { json } => {
            let scenarios = builtin_scenarios();
            if json {
                let entries: Vec<_> = scenarios
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "name": s.name,
                            "description": s.description,
                            "template": s.template,
                            "probes": s.probes.iter().map(|p| p.name()).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("Built-in scenarios:\n");
                for s in &scenarios {
                    println!(
                        "  {:20} {} probes  {}",
                        s.name,
                        s.probes.len(),
                        s.description.as_deref().unwrap_or("")
                    );
                }
            }
            Ok(())
        }

        Commands::Show { name } => {
            let scenario = find_builtin(&name).ok_or(Error::UnknownScenario(name))?;
            print!("{}", serde_yaml::to_string(&scenario)?);
            Ok(())
        }

        Commands::Check {
            scenario,
            host,
            key,
            user,
            http_username,
            http_password,
            max_attempts,
            json,
        } => {
            let scenario = load_scenario(&scenario)?;
            let key = KeyPair::from_private_key(key)?;
            let user = user
                .or_else(|| scenario.ssh_user.clone())
                .unwrap_or_else(|| config.ssh.user.clone());
            let host = Host::new(host, user, key.private_key().to_path_buf());
            let credentials = match (http_username, http_password) {
                (Some(username), Some(password)) => Some(BasicAuth { username, password }),
                (None, None) => None,
                _ => {
                    return Err(Error::Config(
                        "--http-username and --http-password must be given together".to_string(),
                    ))
                }
            };

            let mut settings = RunSettings::from_config(&config);
            settings.retry = RetryPolicy::new(max_attempts, settings.retry.delay);
            settings.verbose = true;
            settings.quiet = json;

            // Nothing is provisioned here; the provisioner is never called
            let terraform = config
                .terraform_binary()
                .unwrap_or_else(|_| PathBuf::from("terraform"));
            let runner = ScenarioRunner::new(settings, real_backends(&config, terraform)?, key);
            let report = runner.check_host(&scenario, host, credentials).await;
            report_outcome(&[report], json)
        }
    }
}

fn select_scenarios(names: &[String], all: bool, files: &[PathBuf]) -> Result<Vec<Scenario>> {
    let mut scenarios = if all {
        builtin_scenarios()
    } else {
        names
            .iter()
            .map(|name| find_builtin(name).ok_or_else(|| Error::UnknownScenario(name.clone())))
            .collect::<Result<Vec<_>>>()?
    };

    for file in files {
        let path = file.canonicalize().unwrap_or_else(|_| file.clone());
        scenarios.push(Scenario::from_file(&path)?);
    }

    if scenarios.is_empty() {
        return Err(Error::NoScenarios);
    }
    Ok(scenarios)
}

/// Resolve a built-in name, falling back to a scenario file path
fn load_scenario(name_or_path: &str) -> Result<Scenario> {
    if let Some(scenario) = find_builtin(name_or_path) {
        return Ok(scenario);
    }
    let path = Path::new(name_or_path);
    if path.is_file() {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        return Scenario::from_file(&path);
    }
    Err(Error::UnknownScenario(name_or_path.to_string()))
}

fn real_backends(config: &Config, terraform: PathBuf) -> Result<Backends> {
    Ok(Backends {
        provisioner: Arc::new(TerraformProvisioner::new(terraform)),
        remote: Arc::new(SshExecutor::new(
            config.ssh_binary()?,
            Duration::from_secs(config.ssh.connect_timeout_secs),
        )),
        http: Arc::new(ReqwestChecker::new(Duration::from_secs(
            config.http.timeout_secs,
        ))?),
    })
}

fn report_outcome(reports: &[ScenarioReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        print_summary(reports);
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        return Err(Error::ScenariosFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

fn print_summary(reports: &[ScenarioReport]) {
    println!("{}", "Summary:".cyan().bold());
    for report in reports {
        let mark = if report.passed {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {} {:20} {}/{} probes  {:.1}s",
            mark,
            report.name,
            report.probes_passed,
            report.probes_total,
            report.elapsed_secs
        );
        if let Some(error) = &report.error {
            let error = match &report.failed_probe {
                Some(probe) => format!("{}: {}", probe, error),
                None => error.clone(),
            };
            println!("      {}", truncate(&error, 160).red());
        }
        if let Some(error) = &report.teardown_error {
            println!("      teardown: {}", truncate(error, 160).red());
        }
        if report.kept {
            if let Some(instance) = &report.instance_name {
                println!("      kept {} for inspection", instance.yellow());
            }
        }
    }
}
