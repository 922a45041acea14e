//! Application-files probe

use tracing::info;

use super::{shell_quote, ProbeContext};
use crate::common::{Error, Result};

const PROBE: &str = "app-files";

pub(super) fn default_dir() -> String {
    "/srv".to_string()
}

pub(super) fn default_files() -> Vec<String> {
    vec!["docker-compose.yml".to_string(), "nginx.conf".to_string()]
}

fn paths(dir: &str, files: &[String]) -> Vec<String> {
    let dir = dir.trim_end_matches('/');
    files.iter().map(|f| format!("{}/{}", dir, f)).collect()
}

pub(super) async fn check(ctx: &ProbeContext<'_>, dir: &str, files: &[String]) -> Result<String> {
    if files.is_empty() {
        return Err(Error::Config(
            "app_files probe needs at least one file name".to_string(),
        ));
    }

    let paths = paths(dir, files);
    let quoted: Vec<String> = paths.iter().map(|p| shell_quote(p)).collect();
    let command = format!("ls {}", quoted.join(" "));

    ctx.remote
        .run(ctx.host, &command)
        .await
        .map_err(|e| match e {
            Error::RemoteCommand { .. } => Error::probe_failed(
                PROBE,
                format!("files {} do not exist yet ({})", paths.join(", "), e),
            ),
            other => other,
        })?;

    info!(host = %ctx.host.hostname, files = ?paths, "Validator has its application files");
    Ok(format!("{} present", paths.join(", ")))
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
        ProbeSpec::app_files().check(&ctx).await
    }

    #[test]
    fn test_paths_join_cleanly() {
        let files = default_files();
        assert_eq!(
            paths("/srv/", &files),
            vec!["/srv/docker-compose.yml", "/srv/nginx.conf"]
        );
    }

    #[tokio::test]
    async fn test_files_present() {
        let executor = ScriptedExecutor::new().on(
            "ls /srv/docker-compose.yml /srv/nginx.conf",
            Reply::ok("/srv/docker-compose.yml\n/srv/nginx.conf"),
        );
        assert!(run(&executor).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_files_name_both_paths() {
        let executor = ScriptedExecutor::new().on(
            "ls",
            Reply::fail(2, "ls: cannot access '/srv/nginx.conf': No such file or directory"),
        );
        let err = run(&executor).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("app-files"));
        assert!(msg.contains("/srv/docker-compose.yml"));
        assert!(msg.contains("/srv/nginx.conf"));
        assert!(err.is_retryable());
    }
}
