//! Authenticated HTTP checks against provisioned hosts

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::common::{Error, Result};

/// HTTP basic-auth credentials read from template outputs
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Status and body of a GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to perform HTTP GETs
#[async_trait]
pub trait HttpChecker: Send + Sync {
    /// GET `url`, optionally with basic auth.
    ///
    /// Transport failures are errors; any HTTP status is a response.
    async fn get(&self, url: &str, auth: Option<&BasicAuth>) -> Result<HttpResponse>;
}

/// HttpChecker backed by reqwest
pub struct ReqwestChecker {
    client: reqwest::Client,
}

impl ReqwestChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("validator-acceptance")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpChecker for ReqwestChecker {
    async fn get(&self, url: &str, auth: Option<&BasicAuth>) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        if let Some(auth) = auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(url, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(url, format!("failed to read body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
