//! Price/revenue ratio calculation and valuation banding.
//!
//! Decision table, evaluated in order:
//! 1. annual revenue zero or unknown → no ratios, "No revenue"
//! 2. market cap zero or unknown → FDV ratio only, "No market cap"
//! 3. otherwise both ratios, labelled by the circulating ratio
//!
//! Ratios are rounded to two decimals after division. The band is chosen from
//! the unrounded circulating ratio.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bounds (exclusive) of the valuation bands, applied in order.
pub const UNDERVALUED_BELOW: f64 = 10.0;
pub const FAIR_VALUE_BELOW: f64 = 30.0;
pub const EXPENSIVE_BELOW: f64 = 100.0;

/// Discrete valuation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Valuation {
    #[serde(rename = "No revenue")]
    NoRevenue,
    #[serde(rename = "No market cap")]
    NoMarketCap,
    #[serde(rename = "Undervalued")]
    Undervalued,
    #[serde(rename = "Fair value")]
    FairValue,
    #[serde(rename = "Expensive")]
    Expensive,
    #[serde(rename = "Extremely overvalued")]
    ExtremelyOvervalued,
}

impl Valuation {
    pub fn label(&self) -> &'static str {
        match self {
            Valuation::NoRevenue => "No revenue",
            Valuation::NoMarketCap => "No market cap",
            Valuation::Undervalued => "Undervalued",
            Valuation::FairValue => "Fair value",
            Valuation::Expensive => "Expensive",
            Valuation::ExtremelyOvervalued => "Extremely overvalued",
        }
    }

    /// Band for a circulating price/revenue ratio.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < UNDERVALUED_BELOW {
            Valuation::Undervalued
        } else if ratio < FAIR_VALUE_BELOW {
            Valuation::FairValue
        } else if ratio < EXPENSIVE_BELOW {
            Valuation::Expensive
        } else {
            Valuation::ExtremelyOvervalued
        }
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown valuation label '{0}'")]
pub struct UnknownValuation(pub String);

impl FromStr for Valuation {
    type Err = UnknownValuation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "No revenue" => Ok(Valuation::NoRevenue),
            "No market cap" => Ok(Valuation::NoMarketCap),
            "Undervalued" => Ok(Valuation::Undervalued),
            "Fair value" => Ok(Valuation::FairValue),
            "Expensive" => Ok(Valuation::Expensive),
            "Extremely overvalued" => Ok(Valuation::ExtremelyOvervalued),
            other => Err(UnknownValuation(other.to_string())),
        }
    }
}

/// Output of [`compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioResult {
    /// Market cap / annual revenue.
    pub ps_circulating: Option<f64>,
    /// Fully-diluted valuation / annual revenue.
    pub ps_fdv: Option<f64>,
    pub valuation: Valuation,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_known_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Compute the price/revenue ratios for one protocol.
pub fn compute(market_cap: f64, fdv: f64, annual_revenue: f64) -> RatioResult {
    if !is_known_positive(annual_revenue) {
        return RatioResult {
            ps_circulating: None,
            ps_fdv: None,
            valuation: Valuation::NoRevenue,
        };
    }

    let ps_fdv = is_known_positive(fdv).then(|| round2(fdv / annual_revenue));

    if !is_known_positive(market_cap) {
        return RatioResult {
            ps_circulating: None,
            ps_fdv,
            valuation: Valuation::NoMarketCap,
        };
    }

    let ratio = market_cap / annual_revenue;
    RatioResult {
        ps_circulating: Some(round2(ratio)),
        ps_fdv,
        valuation: Valuation::from_ratio(ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_value_scenario() {
        let r = compute(50_000_000.0, 0.0, 3_650_000.0);
        assert_eq!(r.ps_circulating, Some(13.70));
        assert_eq!(r.ps_fdv, None);
        assert_eq!(r.valuation, Valuation::FairValue);
    }

    #[test]
    fn no_market_cap_scenario() {
        let r = compute(0.0, 100_000_000.0, 10_000_000.0);
        assert_eq!(r.ps_circulating, None);
        assert_eq!(r.ps_fdv, Some(10.0));
        assert_eq!(r.valuation, Valuation::NoMarketCap);
    }

    #[test]
    fn no_revenue_wins_over_everything() {
        let r = compute(0.0, 0.0, 0.0);
        assert_eq!(r.valuation, Valuation::NoRevenue);
        let r = compute(1e9, 2e9, f64::NAN);
        assert_eq!(r.ps_circulating, None);
        assert_eq!(r.ps_fdv, None);
        assert_eq!(r.valuation, Valuation::NoRevenue);
    }

    #[test]
    fn band_edges_are_exclusive() {
        assert_eq!(Valuation::from_ratio(9.999), Valuation::Undervalued);
        assert_eq!(Valuation::from_ratio(10.0), Valuation::FairValue);
        assert_eq!(Valuation::from_ratio(30.0), Valuation::Expensive);
        assert_eq!(Valuation::from_ratio(100.0), Valuation::ExtremelyOvervalued);
    }

    #[test]
    fn label_uses_unrounded_ratio() {
        // 9.996 rounds to 10.00 but stays in the lowest band
        let r = compute(9_996.0, 0.0, 1_000.0);
        assert_eq!(r.ps_circulating, Some(10.0));
        assert_eq!(r.valuation, Valuation::Undervalued);
    }

    #[test]
    fn labels_round_trip_through_text() {
        for v in [
            Valuation::NoRevenue,
            Valuation::NoMarketCap,
            Valuation::Undervalued,
            Valuation::FairValue,
            Valuation::Expensive,
            Valuation::ExtremelyOvervalued,
        ] {
            assert_eq!(v.label().parse::<Valuation>().unwrap(), v);
            assert_eq!(
                serde_json::to_string(&v).unwrap(),
                format!("\"{}\"", v.label())
            );
        }
        assert!("Cheap".parse::<Valuation>().is_err());
    }
}
