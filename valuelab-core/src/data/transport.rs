//! HTTP transport seam.
//!
//! The fetcher talks to `HttpTransport` rather than to reqwest directly so
//! retry behaviour can be exercised against scripted responses.

use std::time::Duration;
use thiserror::Error;

/// Raw HTTP response: status code and body text.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (no HTTP status was received).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// A single HTTP GET.
pub trait HttpTransport: Send + Sync {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

pub const DEFAULT_USER_AGENT: &str = concat!("valuelab/", env!("CARGO_PKG_VERSION"));

/// Blocking reqwest transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}
