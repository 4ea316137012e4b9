//! Revenue provider (DefiLlama `/summary/fees/{slug}?dataType=dailyRevenue`).

use serde_json::Value;
use std::time::Duration;

use super::coerce::{coerce, Coerced};
use super::fetcher::ResilientFetcher;
use super::provider::{DataError, Normalized, RevenueDataSource};
use crate::domain::RevenueSnapshot;

pub const DEFAULT_BASE_URL: &str = "https://api.llama.fi";

/// Read a revenue total. Missing is a legitimate zero; anything present but
/// unusable (non-numeric or negative) is malformed data.
fn revenue_total(
    payload: &Value,
    field: &'static str,
    defaulted: &mut Vec<&'static str>,
) -> Result<f64, DataError> {
    match coerce(payload.get(field)) {
        Coerced::Number(x) if x >= 0.0 => Ok(x),
        Coerced::Number(x) => Err(DataError::MalformedPayload(format!(
            "revenue field {field} is negative ({x})"
        ))),
        Coerced::Missing => {
            defaulted.push(field);
            Ok(0.0)
        }
        Coerced::Invalid => Err(DataError::MalformedPayload(format!(
            "revenue field {field} is not numeric"
        ))),
    }
}

/// Normalize a fees-summary payload. Annual revenue is derived from the
/// 30-day total.
pub fn normalize_revenue(payload: &Value) -> Result<Normalized<RevenueSnapshot>, DataError> {
    if !payload.is_object() {
        return Err(DataError::MalformedPayload(
            "revenue payload is not a JSON object".into(),
        ));
    }

    let mut defaulted = Vec::new();
    let daily = revenue_total(payload, "total24h", &mut defaulted)?;
    let revenue_7d = revenue_total(payload, "total7d", &mut defaulted)?;
    let revenue_30d = revenue_total(payload, "total30d", &mut defaulted)?;
    // Percent change; may be negative.
    let change_1d = match coerce(payload.get("change_1d")) {
        Coerced::Number(x) => Some(x),
        _ => None,
    };

    Ok(Normalized::new(
        RevenueSnapshot::from_totals(daily, revenue_7d, revenue_30d, change_1d),
        defaulted,
    ))
}

/// DefiLlama-backed [`RevenueDataSource`].
pub struct DefiLlamaProvider {
    fetcher: ResilientFetcher,
    base_url: String,
    timeout: Duration,
}

impl DefiLlamaProvider {
    pub fn new(fetcher: ResilientFetcher, base_url: &str, timeout: Duration) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn fees_url(&self, slug: &str) -> String {
        format!("{}/summary/fees/{slug}", self.base_url)
    }
}

impl RevenueDataSource for DefiLlamaProvider {
    fn name(&self) -> &str {
        "defillama"
    }

    fn revenue_snapshot(&self, slug: &str) -> Result<Normalized<RevenueSnapshot>, DataError> {
        let fetched = self.fetcher.fetch(
            &self.fees_url(slug),
            &[("dataType", "dailyRevenue")],
            self.timeout,
        )?;
        normalize_revenue(&fetched.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RevenueSource;
    use serde_json::json;

    #[test]
    fn annualizes_thirty_day_total() {
        let payload = json!({
            "name": "Aave",
            "total24h": 10_000.0,
            "total7d": 70_000.0,
            "total30d": 300_000.0,
            "change_1d": -3.5
        });
        let n = normalize_revenue(&payload).unwrap();
        assert!(n.defaulted.is_empty());
        assert_eq!(n.value.annual_revenue, 3_650_000.0);
        assert_eq!(n.value.daily_revenue, 10_000.0);
        assert_eq!(n.value.change_1d, Some(-3.5));
        assert_eq!(n.value.revenue_source, RevenueSource::Reported);
    }

    #[test]
    fn missing_totals_are_zero_revenue() {
        let n = normalize_revenue(&json!({"total24h": null})).unwrap();
        assert_eq!(n.value.annual_revenue, 0.0);
        assert_eq!(n.value.revenue_30d, 0.0);
        assert_eq!(n.value.change_1d, None);
        assert_eq!(n.defaulted, vec!["total24h", "total7d", "total30d"]);
    }

    #[test]
    fn non_numeric_total_is_malformed() {
        assert!(matches!(
            normalize_revenue(&json!({"total30d": "lots"})),
            Err(DataError::MalformedPayload(_))
        ));
        assert!(matches!(
            normalize_revenue(&json!({"total7d": [1, 2]})),
            Err(DataError::MalformedPayload(_))
        ));
    }

    #[test]
    fn negative_total_is_malformed() {
        assert!(matches!(
            normalize_revenue(&json!({"total30d": -5.0})),
            Err(DataError::MalformedPayload(_))
        ));
    }

    #[test]
    fn non_object_payload_fails() {
        assert!(matches!(
            normalize_revenue(&json!("total30d")),
            Err(DataError::MalformedPayload(_))
        ));
    }
}
