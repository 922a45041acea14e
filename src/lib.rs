//! Validator Acceptance - deployment acceptance tests for validator templates
//!
//! This library provisions throwaway validator hosts from infrastructure
//! templates, probes them over SSH and HTTP until they converge, and always
//! destroys what it created.

pub mod cli;
pub mod commands;
pub mod common;
pub mod http;
pub mod probes;
pub mod provision;
pub mod remote;
pub mod retry;
pub mod scenario;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner};
