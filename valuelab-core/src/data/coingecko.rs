//! Valuation provider (CoinGecko `/coins/{id}`).
//!
//! The payload carries a `market_data` section with USD-denominated price,
//! market cap and FDV, plus raw supply figures. Any of these may be absent or
//! null for thinly covered tokens; they default rather than fail.

use serde_json::Value;
use std::time::Duration;

use super::coerce::{lookup, number_or_zero, optional_number};
use super::fetcher::ResilientFetcher;
use super::provider::{DataError, MarketDataSource, Normalized};
use crate::domain::{resolve_market_cap, MarketSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Skip the parts of the coin document we never read.
const COIN_QUERY: [(&str, &str); 4] = [
    ("localization", "false"),
    ("tickers", "false"),
    ("community_data", "false"),
    ("developer_data", "false"),
];

/// Normalize a `/coins/{id}` payload.
///
/// Fails only when the payload is not an object or has no `market_data`
/// object. Missing numbers become 0 (supplies become unknown) and are listed
/// in [`Normalized::defaulted`].
pub fn normalize_market(payload: &Value) -> Result<Normalized<MarketSnapshot>, DataError> {
    if !payload.is_object() {
        return Err(DataError::MalformedPayload(
            "valuation payload is not a JSON object".into(),
        ));
    }
    let market_data = payload
        .get("market_data")
        .filter(|v| v.is_object())
        .ok_or_else(|| {
            DataError::MalformedPayload("valuation payload has no market_data section".into())
        })?;

    let mut defaulted = Vec::new();
    let price = number_or_zero(
        lookup(market_data, &["current_price", "usd"]),
        "current_price.usd",
        &mut defaulted,
    );
    let reported_market_cap = number_or_zero(
        lookup(market_data, &["market_cap", "usd"]),
        "market_cap.usd",
        &mut defaulted,
    );
    let fdv = number_or_zero(
        lookup(market_data, &["fully_diluted_valuation", "usd"]),
        "fully_diluted_valuation.usd",
        &mut defaulted,
    );
    let circulating_supply = optional_number(
        market_data.get("circulating_supply"),
        "circulating_supply",
        &mut defaulted,
    );
    let total_supply = optional_number(
        market_data.get("total_supply"),
        "total_supply",
        &mut defaulted,
    );
    let max_supply = optional_number(market_data.get("max_supply"), "max_supply", &mut defaulted);

    let (market_cap, market_cap_source) = resolve_market_cap(reported_market_cap, fdv);

    Ok(Normalized::new(
        MarketSnapshot {
            price,
            market_cap,
            fdv,
            circulating_supply,
            total_supply,
            max_supply,
            market_cap_source,
        },
        defaulted,
    ))
}

/// CoinGecko-backed [`MarketDataSource`].
pub struct CoinGeckoProvider {
    fetcher: ResilientFetcher,
    base_url: String,
    timeout: Duration,
}

impl CoinGeckoProvider {
    pub fn new(fetcher: ResilientFetcher, base_url: &str, timeout: Duration) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn coin_url(&self, valuation_id: &str) -> String {
        format!("{}/coins/{valuation_id}", self.base_url)
    }
}

impl MarketDataSource for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn market_snapshot(&self, valuation_id: &str) -> Result<Normalized<MarketSnapshot>, DataError> {
        let fetched = self
            .fetcher
            .fetch(&self.coin_url(valuation_id), &COIN_QUERY, self.timeout)?;
        normalize_market(&fetched.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketCapSource;
    use serde_json::json;

    #[test]
    fn full_payload() {
        let payload = json!({
            "id": "aave",
            "market_data": {
                "current_price": {"usd": 250.5, "eur": 230.0},
                "market_cap": {"usd": 3_800_000_000.0},
                "fully_diluted_valuation": {"usd": 4_000_000_000.0},
                "circulating_supply": 15_100_000.0,
                "total_supply": 16_000_000.0,
                "max_supply": 16_000_000.0
            }
        });
        let n = normalize_market(&payload).unwrap();
        assert!(n.defaulted.is_empty());
        assert_eq!(n.value.price, 250.5);
        assert_eq!(n.value.market_cap, 3_800_000_000.0);
        assert_eq!(n.value.fdv, 4_000_000_000.0);
        assert_eq!(n.value.max_supply, Some(16_000_000.0));
        assert_eq!(n.value.market_cap_source, MarketCapSource::Reported);
    }

    #[test]
    fn zero_market_cap_falls_back_to_fdv() {
        let payload = json!({
            "market_data": {
                "current_price": {"usd": 0.004},
                "market_cap": {"usd": 0},
                "fully_diluted_valuation": {"usd": 100_000_000.0}
            }
        });
        let n = normalize_market(&payload).unwrap();
        assert_eq!(n.value.market_cap, 100_000_000.0);
        assert_eq!(n.value.market_cap_source, MarketCapSource::FdvFallback);
    }

    #[test]
    fn missing_fields_default() {
        let payload = json!({
            "market_data": {
                "current_price": {},
                "market_cap": null,
                "max_supply": null
            }
        });
        let n = normalize_market(&payload).unwrap();
        assert_eq!(n.value.price, 0.0);
        assert_eq!(n.value.market_cap, 0.0);
        assert_eq!(n.value.fdv, 0.0);
        assert_eq!(n.value.circulating_supply, None);
        assert_eq!(n.value.max_supply, None);
        assert_eq!(
            n.defaulted,
            vec![
                "current_price.usd",
                "market_cap.usd",
                "fully_diluted_valuation.usd",
                "circulating_supply",
                "total_supply",
                "max_supply"
            ]
        );
    }

    #[test]
    fn missing_market_data_section_fails() {
        assert!(matches!(
            normalize_market(&json!({"id": "aave"})),
            Err(DataError::MalformedPayload(_))
        ));
        assert!(matches!(
            normalize_market(&json!({"market_data": "soon"})),
            Err(DataError::MalformedPayload(_))
        ));
    }

    #[test]
    fn non_object_payload_fails() {
        assert!(matches!(
            normalize_market(&json!([1, 2, 3])),
            Err(DataError::MalformedPayload(_))
        ));
    }
}
