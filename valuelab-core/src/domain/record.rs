//! Durable per-day records and their trend projection.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::snapshot::{MarketSnapshot, RevenueSnapshot};
use crate::valuation::{RatioResult, Valuation};

/// One row of history. Natural key: `(date, protocol)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshotRecord {
    pub date: NaiveDate,
    /// Protocol display name.
    pub protocol: String,
    pub price: f64,
    pub market_cap: f64,
    pub fdv: f64,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub daily_revenue: f64,
    pub revenue_7d: f64,
    pub revenue_30d: f64,
    pub annual_revenue: f64,
    pub ps_circulating: Option<f64>,
    pub ps_fdv: Option<f64>,
    pub valuation: Valuation,
    pub captured_at: NaiveDateTime,
}

impl DailySnapshotRecord {
    pub fn assemble(
        date: NaiveDate,
        protocol: &str,
        market: &MarketSnapshot,
        revenue: &RevenueSnapshot,
        ratio: &RatioResult,
        captured_at: NaiveDateTime,
    ) -> Self {
        Self {
            date,
            protocol: protocol.to_string(),
            price: market.price,
            market_cap: market.market_cap,
            fdv: market.fdv,
            circulating_supply: market.circulating_supply,
            total_supply: market.total_supply,
            max_supply: market.max_supply,
            daily_revenue: revenue.daily_revenue,
            revenue_7d: revenue.revenue_7d,
            revenue_30d: revenue.revenue_30d,
            annual_revenue: revenue.annual_revenue,
            ps_circulating: ratio.ps_circulating,
            ps_fdv: ratio.ps_fdv,
            valuation: ratio.valuation,
            captured_at,
        }
    }
}

/// The slice of a record shown in trend windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub ps_circulating: Option<f64>,
    pub annual_revenue: f64,
    pub valuation: Valuation,
}

impl From<&DailySnapshotRecord> for HistoryPoint {
    fn from(r: &DailySnapshotRecord) -> Self {
        Self {
            date: r.date,
            price: r.price,
            ps_circulating: r.ps_circulating,
            annual_revenue: r.annual_revenue,
            valuation: r.valuation,
        }
    }
}
