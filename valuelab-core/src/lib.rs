//! ValueLab Core: domain types, data fetching, valuation math, history store.
//!
//! This crate contains everything with decision logic:
//! - Domain types (protocol descriptors, market/revenue snapshots, daily records)
//! - Resilient HTTP fetcher with linear backoff and failure classification
//! - Normalizers for the valuation and revenue payloads (missing fields default)
//! - Price/revenue ratio calculator with valuation banding
//! - SQLite-backed historical store with idempotent daily upserts

pub mod data;
pub mod domain;
pub mod store;
pub mod valuation;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across the pipeline are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::ProtocolDescriptor>();
        require_sync::<domain::ProtocolDescriptor>();
        require_send::<domain::ProtocolTable>();
        require_sync::<domain::ProtocolTable>();
        require_send::<domain::MarketSnapshot>();
        require_sync::<domain::MarketSnapshot>();
        require_send::<domain::RevenueSnapshot>();
        require_sync::<domain::RevenueSnapshot>();
        require_send::<domain::DailySnapshotRecord>();
        require_sync::<domain::DailySnapshotRecord>();
        require_send::<valuation::RatioResult>();
        require_sync::<valuation::RatioResult>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::ResilientFetcher>();
        require_sync::<data::ResilientFetcher>();
    }
}
