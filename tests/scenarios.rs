//! Scenario runner tests against in-memory backends
//!
//! These exercise the full provision, probe and teardown cycle without a
//! cloud account: the provisioner, remote shell and HTTP client are replaced
//! by the fakes in `validator_acceptance::testing`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use validator_acceptance::http::BasicAuth;
use validator_acceptance::provision::{ProvisionOptions, Provisioner};
use validator_acceptance::remote::{Host, KeyPair};
use validator_acceptance::retry::RetryPolicy;
use validator_acceptance::scenario::{
    builtin_scenarios, find_builtin, run_suite, Backends, RunSettings, Scenario, ScenarioRunner,
};
use validator_acceptance::testing::{
    RecordingProvisioner, Reply, ScriptedExecutor, StaticHttpChecker,
};
use validator_acceptance::Result;

const HOST: &str = "198.51.100.7";

fn test_key(name: &str) -> KeyPair {
    let dir = std::env::temp_dir().join("validator-acceptance-tests");
    std::fs::create_dir_all(&dir).expect("Failed to create key dir");
    let private = dir.join(name);
    std::fs::write(&private, "PRIVATE KEY").expect("Failed to write key");
    std::fs::write(private.with_extension("pub"), "ssh-rsa AAAA test\n")
        .expect("Failed to write public key");
    KeyPair::from_private_key(private).expect("Failed to load key")
}

fn settings(max_attempts: u32) -> RunSettings {
    RunSettings {
        retry: RetryPolicy::new(max_attempts, Duration::ZERO),
        quiet: true,
        ..RunSettings::default()
    }
}

fn runner(
    provisioner: Arc<dyn Provisioner>,
    executor: Arc<ScriptedExecutor>,
    http: Arc<StaticHttpChecker>,
    settings: RunSettings,
    key_name: &str,
) -> ScenarioRunner {
    ScenarioRunner::new(
        settings,
        Backends {
            provisioner,
            remote: executor,
            http,
        },
        test_key(key_name),
    )
}

/// A host where every built-in probe passes
fn healthy_host() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .on("df | grep /srv", Reply::ok("204800000"))
        .on("df", Reply::ok("203000000"))
        .on("command -v", Reply::ok("/usr/bin/docker"))
        .on("du", Reply::ok("9100000"))
        .on("ls", Reply::ok("/srv/docker-compose.yml\n/srv/nginx.conf"))
}

fn simple_validator_outputs() -> RecordingProvisioner {
    RecordingProvisioner::new()
        .with_output("public_ip", HOST)
        .with_output("http_username", "prometheus")
        .with_output("http_password", "hunter2")
}

#[tokio::test]
async fn test_simple_validator_reads_credentials_from_outputs() {
    let provisioner = Arc::new(simple_validator_outputs());
    let http = Arc::new(StaticHttpChecker::respond(200, "node_exporter_build_info 1"));
    let runner = runner(
        provisioner.clone(),
        Arc::new(healthy_host()),
        http.clone(),
        settings(1),
        "creds",
    );

    let report = runner.run(&find_builtin("simple-validator").unwrap()).await;

    assert!(report.passed, "{:?}", report.error);
    assert_eq!(report.probes_passed, 4);
    assert_eq!(report.host.as_deref(), Some(HOST));
    assert_eq!(
        http.requests(),
        vec![(
            format!("http://{}:9100/metrics", HOST),
            Some("prometheus".to_string())
        )]
    );
    assert_eq!(
        provisioner.events(),
        vec![
            "apply:simple-validator",
            "output:public_ip",
            "output:http_username",
            "output:http_password",
            "destroy:simple-validator",
        ]
    );
    let applied = provisioner.applied();
    assert_eq!(applied[0].vars.get("ssh_key").unwrap(), "ssh-rsa AAAA test");
}

#[tokio::test]
async fn test_probes_retry_until_host_converges() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .on_sequence(
                "df",
                vec![
                    Reply::unreachable(),
                    Reply::ok(""),
                    Reply::ok("150000000"),
                    Reply::ok("200000000"),
                ],
            )
            .on("command -v", Reply::ok("/usr/bin/docker")),
    );
    let provisioner = Arc::new(RecordingProvisioner::new().with_output("public_ip", HOST));
    let runner = runner(
        provisioner.clone(),
        executor.clone(),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(5),
        "converge",
    );

    let report = runner.run(&find_builtin("additional-volume").unwrap()).await;

    assert!(report.passed, "{:?}", report.error);
    let df_calls = executor.calls().iter().filter(|c| c.starts_with("df")).count();
    assert_eq!(df_calls, 4);
    assert_eq!(provisioner.destroy_count(), 1);
}

#[tokio::test]
async fn test_exhausted_probe_fails_and_skips_the_rest() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .on("command -v", Reply::ok("/usr/bin/docker"))
            .on("du", Reply::ok("1200000")),
    );
    let provisioner = Arc::new(RecordingProvisioner::new().with_output("public_ip", HOST));
    let runner = runner(
        provisioner.clone(),
        executor.clone(),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(3),
        "exhaust",
    );

    let report = runner.run(&find_builtin("polkashots").unwrap()).await;

    assert!(!report.passed);
    assert_eq!(report.probes_passed, 1);
    assert_eq!(report.probes_total, 3);
    assert!(report.error.unwrap().contains("1200000"));
    assert_eq!(executor.calls().iter().filter(|c| c.contains("du")).count(), 3);
    assert!(!executor.calls().iter().any(|c| c.starts_with("ls")));
    assert_eq!(provisioner.destroy_count(), 1);
}

#[tokio::test]
async fn test_unparseable_output_stops_retrying() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .on("df", Reply::ok("Filesystem"))
            .on("command -v", Reply::ok("/usr/bin/docker")),
    );
    let provisioner = Arc::new(RecordingProvisioner::new().with_output("public_ip", HOST));
    let runner = runner(
        provisioner.clone(),
        executor.clone(),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(10),
        "parse",
    );

    let report = runner.run(&find_builtin("additional-volume").unwrap()).await;

    assert!(!report.passed);
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(provisioner.destroy_count(), 1);
}

#[tokio::test]
async fn test_unreachable_host_report_names_the_failing_check() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .on("command -v", Reply::ok("/usr/bin/docker"))
            .on("du", Reply::unreachable()),
    );
    let provisioner = Arc::new(RecordingProvisioner::new().with_output("public_ip", HOST));
    let runner = runner(
        provisioner.clone(),
        executor,
        Arc::new(StaticHttpChecker::unreachable()),
        settings(2),
        "unreachable",
    );

    let report = runner.run(&find_builtin("polkashots").unwrap()).await;

    assert!(!report.passed);
    assert_eq!(report.failed_probe.as_deref(), Some("snapshot-size"));
    assert!(report.error.as_deref().unwrap().contains("Connection refused"));
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["failed_probe"], "snapshot-size");
    assert_eq!(provisioner.destroy_count(), 1);
}

#[tokio::test]
async fn test_several_matching_filesystems_fail_without_retrying() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .on("df", Reply::ok("200000000\n8065444"))
            .on("command -v", Reply::ok("/usr/bin/docker")),
    );
    let provisioner = Arc::new(RecordingProvisioner::new().with_output("public_ip", HOST));
    let runner = runner(
        provisioner.clone(),
        executor.clone(),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(10),
        "two-filesystems",
    );

    let report = runner.run(&find_builtin("additional-volume").unwrap()).await;

    assert!(!report.passed);
    assert_eq!(report.failed_probe.as_deref(), Some("disk-size"));
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(provisioner.destroy_count(), 1);
}

/// Provisioner whose apply returns only once every scenario is applying
struct RendezvousProvisioner {
    barrier: Barrier,
    inner: RecordingProvisioner,
}

#[async_trait]
impl Provisioner for RendezvousProvisioner {
    async fn init_and_apply(&self, opts: &ProvisionOptions) -> Result<()> {
        self.barrier.wait().await;
        self.inner.init_and_apply(opts).await
    }

    async fn output(&self, opts: &ProvisionOptions, name: &str) -> Result<String> {
        self.inner.output(opts, name).await
    }

    async fn destroy(&self, opts: &ProvisionOptions) -> Result<()> {
        self.inner.destroy(opts).await
    }
}

#[tokio::test]
async fn test_suite_runs_scenarios_concurrently() {
    let scenarios: Vec<Scenario> = builtin_scenarios()
        .into_iter()
        .filter(|s| !s.needs_credentials())
        .collect();
    assert_eq!(scenarios.len(), 2);

    let provisioner = Arc::new(RendezvousProvisioner {
        barrier: Barrier::new(scenarios.len()),
        inner: RecordingProvisioner::new().with_output("public_ip", HOST),
    });
    let runner = Arc::new(runner(
        provisioner.clone(),
        Arc::new(healthy_host()),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(1),
        "suite",
    ));

    let reports = tokio::time::timeout(Duration::from_secs(10), run_suite(runner, scenarios))
        .await
        .expect("scenarios did not run concurrently");

    let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["additional-volume", "polkashots"]);
    assert!(reports.iter().all(|r| r.passed));
    assert_eq!(provisioner.inner.destroy_count(), 2);

    let instances: Vec<_> = reports.iter().filter_map(|r| r.instance_name.clone()).collect();
    assert_ne!(instances[0], instances[1]);
}

#[tokio::test]
async fn test_suite_runs_duplicate_names_once() {
    let provisioner = Arc::new(RecordingProvisioner::new().with_output("public_ip", HOST));
    let runner = Arc::new(runner(
        provisioner.clone(),
        Arc::new(healthy_host()),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(1),
        "dupes",
    ));
    let polkashots = find_builtin("polkashots").unwrap();

    let reports = run_suite(runner, vec![polkashots.clone(), polkashots]).await;

    assert_eq!(reports.len(), 1);
    assert_eq!(provisioner.destroy_count(), 1);
}

#[tokio::test]
async fn test_check_host_runs_yaml_scenario_without_provisioning() {
    let scenario = Scenario::from_yaml(
        r#"
name: custom-metrics
template: unused
outputs:
  http_username: http_username
  http_password: http_password
probes:
  - probe: metrics_endpoint
    port: 9615
    expect_body: substrate_block_height
  - probe: binaries
    names: [polkadot]
"#,
    )
    .unwrap();

    let provisioner = Arc::new(RecordingProvisioner::new());
    let executor = Arc::new(
        ScriptedExecutor::new().on("command -v polkadot", Reply::ok("/usr/bin/polkadot")),
    );
    let http = Arc::new(StaticHttpChecker::respond(200, "substrate_block_height 42"));
    let runner = runner(provisioner.clone(), executor, http.clone(), settings(1), "check");

    let host = Host::new(HOST, "admin", PathBuf::from("/unused"));
    let credentials = BasicAuth {
        username: "ops".to_string(),
        password: "secret".to_string(),
    };
    let report = runner.check_host(&scenario, host, Some(credentials)).await;

    assert!(report.passed, "{:?}", report.error);
    assert_eq!(report.probes_passed, 2);
    assert!(report.instance_name.is_none());
    assert!(provisioner.events().is_empty());
    assert_eq!(http.requests()[0].0, format!("http://{}:9615/metrics", HOST));
}

#[tokio::test]
async fn test_report_serializes_for_json_output() {
    let provisioner = Arc::new(RecordingProvisioner::new().failing_apply());
    let runner = runner(
        provisioner,
        Arc::new(ScriptedExecutor::new()),
        Arc::new(StaticHttpChecker::unreachable()),
        settings(1),
        "json",
    );

    let report = runner.run(&find_builtin("polkashots").unwrap()).await;
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["name"], "polkashots");
    assert_eq!(value["passed"], false);
    assert_eq!(value["probes_passed"], 0);
    assert!(value["error"].as_str().unwrap().contains("InsufficientInstanceCapacity"));
    assert!(value.get("failed_probe").is_none());
    assert!(value.get("teardown_error").is_none());
}
