//! Normalized market and revenue snapshots.

use serde::{Deserialize, Serialize};

/// Where the working market-cap figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCapSource {
    /// The provider's reported circulating market cap.
    Reported,
    /// Reported market cap was zero; fully-diluted valuation substituted.
    FdvFallback,
}

/// Valuation data for one protocol token, in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: f64,
    /// Working market cap (after the FDV fallback, see [`resolve_market_cap`]).
    pub market_cap: f64,
    pub fdv: f64,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub market_cap_source: MarketCapSource,
}

/// Apply the zero-market-cap policy: a reported market cap of zero with a
/// positive FDV yields the FDV as the working market cap.
pub fn resolve_market_cap(reported: f64, fdv: f64) -> (f64, MarketCapSource) {
    if reported == 0.0 && fdv > 0.0 {
        (fdv, MarketCapSource::FdvFallback)
    } else {
        (reported, MarketCapSource::Reported)
    }
}

/// Where the revenue figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSource {
    Reported,
    Manual,
}

/// Protocol revenue, in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSnapshot {
    pub daily_revenue: f64,
    pub revenue_7d: f64,
    pub revenue_30d: f64,
    pub annual_revenue: f64,
    /// Day-over-day change in percent, when the provider reports one.
    pub change_1d: Option<f64>,
    pub revenue_source: RevenueSource,
}

/// Annualize a 30-day revenue total: `(r30 / 30) * 365`, or 0 when the total
/// is not positive.
pub fn annualize_30d(revenue_30d: f64) -> f64 {
    if revenue_30d > 0.0 {
        (revenue_30d / 30.0) * 365.0
    } else {
        0.0
    }
}

impl RevenueSnapshot {
    /// Build from provider totals; annual revenue is derived from the 30-day total.
    pub fn from_totals(
        daily_revenue: f64,
        revenue_7d: f64,
        revenue_30d: f64,
        change_1d: Option<f64>,
    ) -> Self {
        Self {
            daily_revenue,
            revenue_7d,
            revenue_30d,
            annual_revenue: annualize_30d(revenue_30d),
            change_1d,
            revenue_source: RevenueSource::Reported,
        }
    }

    /// Build from a manually configured annual figure, prorating backwards.
    pub fn from_manual_annual(annual_revenue: f64) -> Self {
        let daily = annual_revenue / 365.0;
        Self {
            daily_revenue: daily,
            revenue_7d: daily * 7.0,
            revenue_30d: daily * 30.0,
            annual_revenue,
            change_1d: None,
            revenue_source: RevenueSource::Manual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn fdv_substitutes_zero_market_cap() {
        assert_eq!(
            resolve_market_cap(0.0, 100_000_000.0),
            (100_000_000.0, MarketCapSource::FdvFallback)
        );
    }

    #[test]
    fn reported_market_cap_kept() {
        assert_eq!(
            resolve_market_cap(5.0, 10.0),
            (5.0, MarketCapSource::Reported)
        );
        assert_eq!(resolve_market_cap(0.0, 0.0), (0.0, MarketCapSource::Reported));
    }

    #[test]
    fn annualizes_thirty_day_total() {
        assert_eq!(annualize_30d(300_000.0), 3_650_000.0);
        assert_eq!(annualize_30d(0.0), 0.0);
        assert_eq!(annualize_30d(-10.0), 0.0);
    }

    #[test]
    fn manual_revenue_prorates_backwards() {
        let r = RevenueSnapshot::from_manual_annual(492_000_000.0);
        assert_eq!(r.annual_revenue, 492_000_000.0);
        assert!(approx(r.daily_revenue, 1_347_945.21));
        assert!(approx(r.revenue_30d, 40_438_356.16));
        assert!(approx(r.revenue_7d, 9_435_616.44));
        assert_eq!(r.revenue_source, RevenueSource::Manual);
        assert_eq!(r.change_1d, None);
    }
}
