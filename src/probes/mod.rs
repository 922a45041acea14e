//! State-assertion probes
//!
//! A probe is an idempotent, side-effect-free check against a provisioned
//! host. It returns a diagnostic message on success and an error naming the
//! failed check otherwise. Probes never retry themselves; the scenario runner
//! wraps each one in [`do_with_retry`](crate::retry::do_with_retry).

mod app_files;
mod binaries;
mod disk;
mod metrics;
mod snapshot;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::http::{BasicAuth, HttpChecker};
use crate::remote::{Host, RemoteExecutor};

pub use disk::DiskBound;

/// Collaborators a probe may use
pub struct ProbeContext<'a> {
    pub host: &'a Host,
    pub remote: &'a dyn RemoteExecutor,
    pub http: &'a dyn HttpChecker,
    pub credentials: Option<&'a BasicAuth>,
}

/// A single probe as written in a scenario
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum ProbeSpec {
    /// Size of the filesystem mounted at `mount`, in 1K blocks as `df` reports
    DiskSize {
        #[serde(default = "disk::default_mount")]
        mount: String,
        min: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
    },
    /// Executables that must be on the remote PATH
    Binaries {
        #[serde(default = "binaries::default_names")]
        names: Vec<String>,
    },
    /// Application configuration files that must exist
    AppFiles {
        #[serde(default = "app_files::default_dir")]
        dir: String,
        #[serde(default = "app_files::default_files")]
        files: Vec<String>,
    },
    /// Size of the chain snapshot directory, in 1K blocks as `du` reports
    SnapshotSize {
        #[serde(default = "snapshot::default_path")]
        path: String,
        #[serde(default = "snapshot::default_min_size")]
        min_size: u64,
    },
    /// Authenticated metrics endpoint served by the host
    MetricsEndpoint {
        #[serde(default = "metrics::default_scheme")]
        scheme: String,
        #[serde(default = "metrics::default_port")]
        port: u16,
        #[serde(default = "metrics::default_path")]
        path: String,
        #[serde(default = "metrics::default_expect_body")]
        expect_body: Option<String>,
        #[serde(default = "metrics::default_auth_required")]
        auth_required: bool,
    },
}

impl ProbeSpec {
    /// Disk-size probe requiring at least `min` blocks
    pub fn disk_at_least(mount: &str, min: u64) -> Self {
        Self::DiskSize {
            mount: mount.to_string(),
            min,
            max: None,
        }
    }

    /// Disk-size probe requiring `min..=max` blocks
    pub fn disk_within(mount: &str, min: u64, max: u64) -> Self {
        Self::DiskSize {
            mount: mount.to_string(),
            min,
            max: Some(max),
        }
    }

    /// Binary-presence probe with the default docker tooling
    pub fn docker_binaries() -> Self {
        Self::Binaries {
            names: binaries::default_names(),
        }
    }

    /// Application-files probe with the default layout
    pub fn app_files() -> Self {
        Self::AppFiles {
            dir: app_files::default_dir(),
            files: app_files::default_files(),
        }
    }

    /// Snapshot-size probe with the default path and threshold
    pub fn snapshot() -> Self {
        Self::SnapshotSize {
            path: snapshot::default_path(),
            min_size: snapshot::default_min_size(),
        }
    }

    /// Metrics-endpoint probe with the node_exporter defaults
    pub fn metrics_endpoint() -> Self {
        Self::MetricsEndpoint {
            scheme: metrics::default_scheme(),
            port: metrics::default_port(),
            path: metrics::default_path(),
            expect_body: metrics::default_expect_body(),
            auth_required: metrics::default_auth_required(),
        }
    }

    /// Short stable name used in errors and reports
    pub fn name(&self) -> &'static str {
        match self {
            ProbeSpec::DiskSize { .. } => "disk-size",
            ProbeSpec::Binaries { .. } => "binaries",
            ProbeSpec::AppFiles { .. } => "app-files",
            ProbeSpec::SnapshotSize { .. } => "snapshot-size",
            ProbeSpec::MetricsEndpoint { .. } => "metrics-endpoint",
        }
    }

    /// Whether the probe reads HTTP credentials from the template outputs
    pub fn needs_credentials(&self) -> bool {
        matches!(
            self,
            ProbeSpec::MetricsEndpoint {
                auth_required: true,
                ..
            }
        )
    }

    /// Human-readable description of one attempt, used in retry logs
    pub fn description(&self, host: &Host) -> String {
        let addr = &host.hostname;
        match self {
            ProbeSpec::DiskSize { mount, .. } => {
                format!("SSHing to validator {} to check {} size", addr, mount)
            }
            ProbeSpec::Binaries { names } => format!(
                "SSHing to validator {} to check if {} are installed",
                addr,
                names.join(" & ")
            ),
            ProbeSpec::AppFiles { dir, .. } => format!(
                "SSHing to validator {} to check if application files exist in {}",
                addr, dir
            ),
            ProbeSpec::SnapshotSize { path, .. } => format!(
                "SSHing to validator {} to check if snapshot folder {} is big enough",
                addr, path
            ),
            ProbeSpec::MetricsEndpoint { port, path, .. } => format!(
                "Checking if the metrics endpoint {}:{}{} is serving",
                addr, port, path
            ),
        }
    }

    /// Run one attempt of the probe
    pub async fn check(&self, ctx: &ProbeContext<'_>) -> Result<String> {
        match self {
            ProbeSpec::DiskSize { mount, min, max } => {
                let bound = DiskBound {
                    min: *min,
                    max: *max,
                };
                disk::check(ctx, mount, &bound).await
            }
            ProbeSpec::Binaries { names } => binaries::check(ctx, names).await,
            ProbeSpec::AppFiles { dir, files } => app_files::check(ctx, dir, files).await,
            ProbeSpec::SnapshotSize { path, min_size } => {
                snapshot::check(ctx, path, *min_size).await
            }
            ProbeSpec::MetricsEndpoint {
                scheme,
                port,
                path,
                expect_body,
                auth_required,
            } => {
                let target = metrics::Target {
                    scheme,
                    port: *port,
                    path,
                    expect_body: expect_body.as_deref(),
                    auth_required: *auth_required,
                };
                metrics::check(ctx, &target).await
            }
        }
    }
}

/// Quote a value for a POSIX shell
pub(crate) fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=@".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Parse a block count printed by `df` or `du`.
///
/// Empty output means the pipeline found nothing yet (volume not mounted,
/// directory not created), which is worth another attempt. Anything else
/// that is not exactly one number, including one number per line when the
/// pattern matched several filesystems, will not improve by waiting.
pub(crate) fn parse_blocks(probe: &str, what: &str, output: &str) -> Result<u64> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(Error::probe_failed(
            probe,
            format!("{} reported nothing yet", what),
        ));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::parse(trimmed, "a single block count"))
}
