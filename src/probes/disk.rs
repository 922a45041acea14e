//! Disk-size probe

use tracing::info;

use super::{parse_blocks, shell_quote, ProbeContext};
use crate::common::{Error, Result};

const PROBE: &str = "disk-size";

pub(super) fn default_mount() -> String {
    "/dev/root".to_string()
}

/// Accepted filesystem sizes in 1K blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskBound {
    pub min: u64,
    /// Upper bound, inclusive. `None` accepts anything from `min` up.
    pub max: Option<u64>,
}

impl DiskBound {
    pub fn contains(&self, size: u64) -> bool {
        size >= self.min && self.max.map_or(true, |max| size <= max)
    }
}

pub(super) fn command(mount: &str) -> String {
    format!("df | grep {} | awk '{{print $2}}'", shell_quote(mount))
}

pub(super) async fn check(ctx: &ProbeContext<'_>, mount: &str, bound: &DiskBound) -> Result<String> {
    let output = ctx
        .remote
        .run(ctx.host, &command(mount))
        .await
        .map_err(|e| match e {
            Error::RemoteCommand { .. } => {
                Error::probe_failed(PROBE, format!("error reading size of {}: {}", mount, e))
            }
            other => other,
        })?;
    let size = parse_blocks(PROBE, &format!("df for {}", mount), &output)?;

    if !bound.contains(size) {
        let expected = match bound.max {
            Some(max) => format!("within {} and {}", bound.min, max),
            None => format!("at least {}", bound.min),
        };
        return Err(Error::probe_failed(
            PROBE,
            format!("expected {} size to be {} but got {}", mount, expected, size),
        ));
    }

    info!(host = %ctx.host.hostname, %mount, size, "Validator has the right disk size");
    Ok(format!("{} is {} blocks", mount, size))
}
