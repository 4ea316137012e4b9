//! Resilient JSON fetcher.
//!
//! One logical GET with a bounded attempt budget:
//! - timeouts and other transport errors retry after `base_delay × attempt`
//! - HTTP 429 waits `base_delay × attempt` and retries on the same budget
//! - any other non-success status aborts immediately
//! - a success body that is not JSON is a malformed payload (not retried)
//!
//! Exhausting the budget returns `DataError::RetriesExhausted`.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::DataError;
use super::transport::{HttpTransport, TransportError};

const TOO_MANY_REQUESTS: u16 = 429;

/// Attempt budget and linear backoff base.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// A successfully fetched JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: Value,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

impl Fetched {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Shared by both providers; holds no per-call state.
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn fetch(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Fetched, DataError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let err = match self.transport.get(url, query, timeout) {
                Ok(resp) if resp.is_success() => {
                    let body: Value = serde_json::from_str(&resp.body).map_err(|e| {
                        warn!(url, attempt, error = %e, "response body is not JSON");
                        DataError::MalformedPayload(format!("invalid JSON from {url}: {e}"))
                    })?;
                    debug!(url, attempt, "fetch succeeded");
                    return Ok(Fetched {
                        body,
                        attempts: attempt,
                    });
                }
                Ok(resp) if resp.status == TOO_MANY_REQUESTS => {
                    warn!(url, attempt, max_attempts, "rate limited (HTTP 429)");
                    DataError::RateLimited
                }
                Ok(resp) => {
                    warn!(url, attempt, status = resp.status, "upstream rejected request");
                    DataError::UpstreamRejected {
                        status: resp.status,
                    }
                }
                Err(TransportError::Timeout(msg)) => {
                    warn!(url, attempt, max_attempts, error = %msg, "request timed out");
                    DataError::TransientNetwork(format!("timeout: {msg}"))
                }
                Err(TransportError::Other(msg)) => {
                    warn!(url, attempt, max_attempts, error = %msg, "transport error");
                    DataError::TransientNetwork(msg)
                }
            };

            if !err.is_retryable() {
                return Err(err);
            }
            last_error = Some(err);

            if attempt < max_attempts {
                let delay = self.policy.backoff(attempt);
                debug!(url, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                std::thread::sleep(delay);
            }
        }

        Err(DataError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(
                last_error
                    .unwrap_or_else(|| DataError::TransientNetwork("no attempt made".into())),
            ),
        })
    }
}
