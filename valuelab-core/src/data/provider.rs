//! Data source traits and structured error types.
//!
//! `MarketDataSource` and `RevenueDataSource` abstract over the two upstream
//! providers so the pipeline can be driven by mocks in tests.

use thiserror::Error;

use crate::domain::{MarketSnapshot, RevenueSnapshot};

/// Structured error types for fetching, normalizing and storing data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("rate limited by provider (HTTP 429)")]
    RateLimited,

    #[error("upstream rejected request: HTTP {status}")]
    UpstreamRejected { status: u16 },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<DataError> },

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("storage read failed: {0}")]
    StorageRead(String),

    #[error("protocol '{protocol}' has neither a revenue endpoint nor a manual revenue")]
    ConfigurationGap { protocol: String },
}

impl DataError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::TransientNetwork(_) | DataError::RateLimited)
    }
}

/// A normalized value plus the names of fields that were missing or
/// unusable upstream and fell back to a default.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub defaulted: Vec<&'static str>,
}

impl<T> Normalized<T> {
    pub fn new(value: T, defaulted: Vec<&'static str>) -> Self {
        Self { value, defaulted }
    }
}

/// Valuation provider (`/coins/{id}`).
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn market_snapshot(&self, valuation_id: &str) -> Result<Normalized<MarketSnapshot>, DataError>;
}

/// Revenue provider (`/summary/fees/{slug}`).
pub trait RevenueDataSource: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn revenue_snapshot(&self, slug: &str) -> Result<Normalized<RevenueSnapshot>, DataError>;
}
