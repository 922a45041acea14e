//! Retry-driven probe executor
//!
//! A freshly provisioned host is not ready when `terraform apply` returns:
//! sshd may still be starting and cloud-init may still be installing
//! packages or pulling a snapshot. Probes are therefore retried with a fixed
//! delay until they pass or the budget runs out.
//!
//! # Example
//!
//! ```ignore
//! use validator_acceptance::retry::{do_with_retry, RetryPolicy};
//!
//! let message = do_with_retry(
//!     &RetryPolicy::default(),
//!     "SSHing to validator 1.2.3.4 to check disk size",
//!     || async { probe.check(&ctx).await },
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::common::Result;

/// Attempt budget for one probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (0 behaves like 1)
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Errors whose [`is_retryable`](crate::common::Error::is_retryable) is false
/// are returned immediately. When every attempt fails, the error from the
/// last attempt is returned.
pub async fn do_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    description: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(%description, attempt, max_attempts, "Attempting");

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                error!(%description, attempt, error = %e, "Failed with a non-retryable error");
                return Err(e);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    error!(
                        %description,
                        attempt,
                        error = %e,
                        "Still failing after max retries"
                    );
                    return Err(e);
                }

                warn!(
                    %description,
                    attempt,
                    max_attempts,
                    error = %e,
                    delay_secs = policy.delay.as_secs_f64(),
                    "Attempt failed, retrying"
                );

                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_immediately() {
        let result = do_with_retry(&fast(3), "op", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_of_five() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = do_with_retry(&fast(5), "op", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::probe_failed("disk-size", "not mounted yet"))
                } else {
                    Ok("mounted")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "mounted");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<()> = do_with_retry(&fast(5), "op", || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                Err(Error::probe_failed("binaries", format!("attempt {}", n)))
            }
        })
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 5);
        match result.unwrap_err() {
            Error::ProbeFailed { message, .. } => assert_eq!(message, "attempt 5"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<u64> = do_with_retry(&fast(30), "op", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(Error::parse("Filesystem", "an integer"))
            }
        })
        .await;

        assert!(matches!(result.unwrap_err(), Error::Parse { .. }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let policy = RetryPolicy::new(0, Duration::ZERO);
        let result: Result<()> = do_with_retry(&policy, "op", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(Error::probe_failed("app-files", "missing"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
