//! Upstream data: HTTP transport, resilient fetching, payload normalization

pub mod coerce;
pub mod coingecko;
pub mod defillama;
pub mod fetcher;
pub mod provider;
pub mod transport;

pub use coingecko::{normalize_market, CoinGeckoProvider};
pub use defillama::{normalize_revenue, DefiLlamaProvider};
pub use fetcher::{Fetched, ResilientFetcher, RetryPolicy};
pub use provider::{DataError, MarketDataSource, Normalized, RevenueDataSource};
pub use transport::{
    HttpResponse, HttpTransport, ReqwestTransport, TransportError, DEFAULT_USER_AGENT,
};
