//! Metrics-endpoint probe
//!
//! The simple validator exposes node_exporter behind basic auth; the
//! credentials come from the template outputs.

use tracing::info;

use super::ProbeContext;
use crate::common::{truncate, Error, Result};

const PROBE: &str = "metrics-endpoint";

pub(super) fn default_scheme() -> String {
    "http".to_string()
}
pub(super) fn default_port() -> u16 {
    9100
}
pub(super) fn default_path() -> String {
    "/metrics".to_string()
}
pub(super) fn default_expect_body() -> Option<String> {
    Some("node_exporter".to_string())
}
pub(super) fn default_auth_required() -> bool {
    true
}

pub(super) struct Target<'a> {
    pub scheme: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub expect_body: Option<&'a str>,
    pub auth_required: bool,
}

impl Target<'_> {
    fn url(&self, hostname: &str) -> String {
        let path = if self.path.starts_with('/') {
            self.path.to_string()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", self.scheme, hostname, self.port, path)
    }
}

pub(super) async fn check(ctx: &ProbeContext<'_>, target: &Target<'_>) -> Result<String> {
    if target.auth_required && ctx.credentials.is_none() {
        return Err(Error::MissingCredentials {
            probe: PROBE.to_string(),
        });
    }

    let url = target.url(&ctx.host.hostname);
    let response = ctx.http.get(&url, ctx.credentials).await?;

    if !response.is_success() {
        return Err(Error::probe_failed(
            PROBE,
            format!("{} answered with status {}", url, response.status),
        ));
    }

    if let Some(marker) = target.expect_body {
        if !response.body.contains(marker) {
            return Err(Error::probe_failed(
                PROBE,
                format!(
                    "{} does not mention '{}'. Got: '{}'",
                    url,
                    marker,
                    truncate(&response.body, 200)
                ),
            ));
        }
    }

    info!(%url, "Metrics endpoint is serving");
    Ok(format!("{} answered {}", url, response.status))
}
