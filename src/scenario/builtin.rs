//! Built-in deployment scenarios
//!
//! One entry per validator template shipped with the deployment repo.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::config::{OutputNames, Scenario};
use crate::probes::ProbeSpec;

/// Smallest acceptable root filesystem, in 1K blocks
const ROOT_DISK_MIN: u64 = 190_000_000;

/// Accepted size of the additional data volume, in 1K blocks
const DATA_VOLUME_MIN: u64 = 190_000_000;
const DATA_VOLUME_MAX: u64 = 210_000_000;

/// All built-in scenarios, in a stable order
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![simple_validator(), additional_volume(), polkashots()]
}

/// Get a built-in scenario by name
pub fn find_builtin(name: &str) -> Option<Scenario> {
    builtin_scenarios().into_iter().find(|s| s.name == name)
}

fn simple_validator() -> Scenario {
    Scenario {
        name: "simple-validator".to_string(),
        description: Some(
            "Validator on the root volume with disk, node_exporter, docker and app file checks"
                .to_string(),
        ),
        template: PathBuf::from("simple-validator"),
        vars: BTreeMap::new(),
        outputs: OutputNames {
            host: "public_ip".to_string(),
            http_username: Some("http_username".to_string()),
            http_password: Some("http_password".to_string()),
        },
        ssh_user: None,
        retry: None,
        probes: vec![
            ProbeSpec::disk_at_least("/dev/root", ROOT_DISK_MIN),
            ProbeSpec::metrics_endpoint(),
            ProbeSpec::docker_binaries(),
            ProbeSpec::app_files(),
        ],
    }
}

fn additional_volume() -> Scenario {
    Scenario {
        name: "additional-volume".to_string(),
        description: Some("Validator with a separate data volume mounted at /srv".to_string()),
        template: PathBuf::from("additional-volume"),
        vars: BTreeMap::new(),
        outputs: OutputNames::default(),
        ssh_user: None,
        retry: None,
        probes: vec![
            ProbeSpec::disk_within("/srv", DATA_VOLUME_MIN, DATA_VOLUME_MAX),
            ProbeSpec::docker_binaries(),
        ],
    }
}

fn polkashots() -> Scenario {
    Scenario {
        name: "polkashots".to_string(),
        description: Some("Validator bootstrapped from a Polkashots snapshot".to_string()),
        template: PathBuf::from("polkashots"),
        vars: BTreeMap::new(),
        outputs: OutputNames::default(),
        ssh_user: None,
        retry: None,
        probes: vec![
            ProbeSpec::docker_binaries(),
            ProbeSpec::snapshot(),
            ProbeSpec::app_files(),
        ],
    }
}
