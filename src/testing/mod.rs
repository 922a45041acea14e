//! In-memory stand-ins for the provisioning, shell and HTTP capabilities
//!
//! Used by the unit tests and by `tests/` to exercise probes and the
//! scenario runner without any cloud account.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::common::{Error, Result};
use crate::http::{BasicAuth, HttpChecker, HttpResponse};
use crate::provision::{ProvisionOptions, Provisioner};
use crate::remote::{Host, RemoteExecutor};

/// Scripted reply of a remote command
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Fail { status: i32, stderr: String },
    Unreachable,
    Panic(String),
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Ok(stdout.to_string())
    }

    pub fn fail(status: i32, stderr: &str) -> Self {
        Reply::Fail {
            status,
            stderr: stderr.to_string(),
        }
    }

    pub fn unreachable() -> Self {
        Reply::Unreachable
    }
}

struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

/// RemoteExecutor answering from a script.
///
/// The first rule whose pattern is a substring of the command answers. A
/// rule with several replies hands them out in order and repeats its last
/// one. Unmatched commands fail like a missing binary.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `reply`
    pub fn on(self, pattern: &str, reply: Reply) -> Self {
        self.on_sequence(pattern, vec![reply])
    }

    /// Answer commands containing `pattern` with `replies`, one per call
    pub fn on_sequence(self, pattern: &str, replies: Vec<Reply>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
        self
    }

    /// Commands received so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, host: &Host, command: &str) -> Result<String> {
        self.calls.lock().unwrap().push(command.to_string());

        let reply = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .find(|r| command.contains(&r.pattern))
                .and_then(|r| {
                    if r.replies.len() > 1 {
                        r.replies.pop_front()
                    } else {
                        r.replies.front().cloned()
                    }
                })
        };

        match reply {
            Some(Reply::Ok(stdout)) => Ok(stdout.trim().to_string()),
            Some(Reply::Fail { status, stderr }) => Err(Error::RemoteCommand {
                command: command.to_string(),
                status,
                stderr,
            }),
            Some(Reply::Unreachable) => Err(Error::RemoteConnection {
                host: host.hostname.clone(),
                message: "Connection refused".to_string(),
            }),
            Some(Reply::Panic(message)) => panic!("{}", message),
            None => Err(Error::RemoteCommand {
                command: command.to_string(),
                status: 127,
                stderr: "command not found".to_string(),
            }),
        }
    }
}

/// HttpChecker returning one fixed response
pub struct StaticHttpChecker {
    response: Option<HttpResponse>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl StaticHttpChecker {
    pub fn respond(status: u16, body: &str) -> Self {
        Self {
            response: Some(HttpResponse {
                status,
                body: body.to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request fails at the transport level
    pub fn unreachable() -> Self {
        Self {
            response: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requested URLs with the basic-auth username used, if any
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpChecker for StaticHttpChecker {
    async fn get(&self, url: &str, auth: Option<&BasicAuth>) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), auth.map(|a| a.username.clone())));
        self.response
            .clone()
            .ok_or_else(|| Error::http(url, "connection refused"))
    }
}

/// Provisioner that records what it was asked to do
#[derive(Default)]
pub struct RecordingProvisioner {
    outputs: BTreeMap<String, String>,
    fail_apply: bool,
    fail_destroy: bool,
    events: Mutex<Vec<String>>,
    applied: Mutex<Vec<ProvisionOptions>>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a template output
    pub fn with_output(mut self, name: &str, value: &str) -> Self {
        self.outputs.insert(name.to_string(), value.to_string());
        self
    }

    /// Make `init_and_apply` fail
    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    /// Make `destroy` fail
    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    /// Calls in order, as `apply:<template>`, `output:<name>`, `destroy:<template>`
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Options passed to each apply
    pub fn applied(&self) -> Vec<ProvisionOptions> {
        self.applied.lock().unwrap().clone()
    }

    /// Number of destroy calls
    pub fn destroy_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with("destroy:"))
            .count()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn init_and_apply(&self, opts: &ProvisionOptions) -> Result<()> {
        self.record(format!("apply:{}", opts.template_name()));
        self.applied.lock().unwrap().push(opts.clone());
        if self.fail_apply {
            return Err(Error::provision(
                &opts.template_name(),
                "Error: creating EC2 Instance: InsufficientInstanceCapacity",
            ));
        }
        Ok(())
    }

    async fn output(&self, _opts: &ProvisionOptions, name: &str) -> Result<String> {
        self.record(format!("output:{}", name));
        self.outputs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingOutput {
                name: name.to_string(),
            })
    }

    async fn destroy(&self, opts: &ProvisionOptions) -> Result<()> {
        self.record(format!("destroy:{}", opts.template_name()));
        if self.fail_destroy {
            return Err(Error::Teardown {
                template: opts.template_name(),
                message: "DependencyViolation".to_string(),
            });
        }
        Ok(())
    }
}
