//! Snapshot-size probe
//!
//! Hosts restoring a chain snapshot download and extract several gigabytes
//! on first boot. The probe passes once the data directory has grown past
//! a threshold that only a successful extraction reaches.

use tracing::info;

use super::{parse_blocks, shell_quote, ProbeContext};
use crate::common::{Error, Result};

const PROBE: &str = "snapshot-size";

pub(super) fn default_path() -> String {
    "/srv/kusama/".to_string()
}

/// 5GB in the 1K blocks `du` reports
pub(super) fn default_min_size() -> u64 {
    5_000_000
}

pub(super) fn command(path: &str) -> String {
    format!("sudo du {} | tail -n1 | awk '{{print $1}}'", shell_quote(path))
}

pub(super) async fn check(ctx: &ProbeContext<'_>, path: &str, min_size: u64) -> Result<String> {
    let output = ctx
        .remote
        .run(ctx.host, &command(path))
        .await
        .map_err(|e| match e {
            Error::RemoteCommand { .. } => Error::probe_failed(
                PROBE,
                format!("error checking size of {}: {}", path, e),
            ),
            other => other,
        })?;
    let size = parse_blocks(PROBE, &format!("du for {}", path), &output)?;

    if size <= min_size {
        return Err(Error::probe_failed(
            PROBE,
            format!(
                "snapshot folder {} is {} blocks, not above {}. Problem downloading the snapshot?",
                path, size, min_size
            ),
        ));
    }

    info!(host = %ctx.host.hostname, %path, size, "Snapshot downloaded");
    Ok(format!("{} is {} blocks", path, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeSpec;
    use crate::remote::Host;
    use crate::testing::{Reply, ScriptedExecutor, StaticHttpChecker};

    async fn run(executor: &ScriptedExecutor) -> Result<String> {
        let host = Host::new("203.0.113.1", "ubuntu", "/k".into());
        let http = StaticHttpChecker::unreachable();
        let ctx = ProbeContext {
            host: &host,
            remote: executor,
            http: &http,
            credentials: None,
        };
        ProbeSpec::snapshot().check(&ctx).await
    }

    #[test]
    fn test_command() {
        assert_eq!(
            command("/srv/kusama/"),
            "sudo du /srv/kusama/ | tail -n1 | awk '{print $1}'"
        );
    }

    #[tokio::test]
    async fn test_below_threshold_fails() {
        let executor = ScriptedExecutor::new().on("du", Reply::ok("4000000\n"));
        let err = run(&executor).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("4000000"));
    }

    #[tokio::test]
    async fn test_above_threshold_passes() {
        let executor = ScriptedExecutor::new().on("du", Reply::ok("6000000\n"));
        let message = run(&executor).await.unwrap();
        assert!(message.contains("6000000"));
    }

    #[tokio::test]
    async fn test_exact_threshold_is_not_enough() {
        let executor = ScriptedExecutor::new().on("du", Reply::ok("5000000"));
        assert!(run(&executor).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_output_is_fatal() {
        let executor = ScriptedExecutor::new().on("du", Reply::ok("du: permission denied"));
        let err = run(&executor).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
