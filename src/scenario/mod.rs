//! Deployment scenarios
//!
//! A scenario names a template, the outputs to read back and the probes that
//! must pass against the provisioned host.

mod builtin;
mod config;
mod runner;

pub use builtin::{builtin_scenarios, find_builtin};
pub use config::{OutputNames, RetryOverride, Scenario};
pub use runner::{run_suite, Backends, RunSettings, ScenarioReport, ScenarioRunner};
