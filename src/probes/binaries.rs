//! Binary-presence probe

use tracing::info;

use super::{shell_quote, ProbeContext};
use crate::common::{Error, Result};

const PROBE: &str = "binaries";

pub(super) fn default_names() -> Vec<String> {
    vec!["docker".to_string(), "docker-compose".to_string()]
}

pub(super) async fn check(ctx: &ProbeContext<'_>, names: &[String]) -> Result<String> {
    if names.is_empty() {
        return Err(Error::Config(
            "binaries probe needs at least one executable name".to_string(),
        ));
    }

    for name in names {
        let command = format!("command -v {}", shell_quote(name));
        if let Err(e) = ctx.remote.run(ctx.host, &command).await {
            return Err(match e {
                Error::RemoteCommand { .. } => Error::probe_failed(
                    PROBE,
                    format!("{} is not installed yet ({})", name, e),
                ),
                other => other,
            });
        }
    }

    info!(host = %ctx.host.hostname, binaries = ?names, "Validator has the required binaries");
    Ok(format!("{} installed", names.join(" & ")))
}

#[cfg(test)]
mod tests {
    use crate::common::Error;
    use crate::probes::{ProbeContext, ProbeSpec};
    use crate::remote::Host;
    use crate::testing::{Reply, ScriptedExecutor, StaticHttpChecker};

    async fn run(executor: &ScriptedExecutor) -> crate::common::Result<String> {
        let host = Host::new("203.0.113.1", "ubuntu", "/k".into());
        let http = StaticHttpChecker::unreachable();
        let ctx = ProbeContext {
            host: &host,
            remote: executor,
            http: &http,
            credentials: None,
        };
        ProbeSpec::docker_binaries().check(&ctx).await
    }

    #[tokio::test]
    async fn test_both_present_passes() {
        let executor = ScriptedExecutor::new()
            .on("command -v docker-compose", Reply::ok("/usr/local/bin/docker-compose"))
            .on("command -v docker", Reply::ok("/usr/bin/docker"));

        let message = run(&executor).await.unwrap();
        assert!(message.contains("docker & docker-compose"));
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_docker_fails_naming_it() {
        let executor = ScriptedExecutor::new()
            .on("command -v docker-compose", Reply::ok("/usr/local/bin/docker-compose"))
            .on("command -v docker", Reply::fail(1, ""));

        let err = run(&executor).await.unwrap_err();
        assert!(matches!(err, Error::ProbeFailed { .. }));
        assert!(err.to_string().contains("docker is not installed"));
        // Stops at the first missing binary
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_compose_fails_naming_it() {
        let executor = ScriptedExecutor::new()
            .on("command -v docker-compose", Reply::fail(1, ""))
            .on("command -v docker", Reply::ok("/usr/bin/docker"));

        let err = run(&executor).await.unwrap_err();
        assert!(err.to_string().contains("docker-compose is not installed"));
    }

    #[tokio::test]
    async fn test_unreachable_host_stays_a_connection_error() {
        let executor = ScriptedExecutor::new().on("command -v", Reply::unreachable());

        let err = run(&executor).await.unwrap_err();
        assert!(matches!(err, Error::RemoteConnection { .. }));
        assert!(err.is_retryable());
    }
}
