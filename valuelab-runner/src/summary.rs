//! Run summary, sorted by circulating P/S ratio (cheapest first).

use chrono::NaiveDate;
use std::fmt::Write as _;
use valuelab_core::valuation::Valuation;

use crate::pipeline::{ProtocolResult, RunReport};

/// Change of the circulating ratio against the oldest point in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioChange {
    pub since: NaiveDate,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub name: String,
    pub chain: String,
    pub price: f64,
    pub market_cap: f64,
    pub annual_revenue: f64,
    pub ps_circulating: Option<f64>,
    pub valuation: Valuation,
    pub trend: Option<RatioChange>,
}

impl SummaryRow {
    /// Build a row; the trend compares against the oldest window point dated
    /// before `run_date`.
    pub fn from_result(result: &ProtocolResult, run_date: NaiveDate) -> Self {
        let trend = result.historical.first().and_then(|first| {
            match (first.ps_circulating, result.ratio.ps_circulating) {
                (Some(then), Some(now)) if first.date < run_date => Some(RatioChange {
                    since: first.date,
                    change: now - then,
                }),
                _ => None,
            }
        });

        Self {
            name: result.name.clone(),
            chain: result.chain.clone(),
            price: result.market.price,
            market_cap: result.market.market_cap,
            annual_revenue: result.revenue.annual_revenue,
            ps_circulating: result.ratio.ps_circulating,
            valuation: result.ratio.valuation,
            trend,
        }
    }
}

/// Rows sorted by circulating ratio ascending; protocols without a ratio last.
pub fn summarize(results: &[ProtocolResult], run_date: NaiveDate) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = results
        .iter()
        .map(|r| SummaryRow::from_result(r, run_date))
        .collect();
    rows.sort_by(|a, b| {
        let ka = a.ps_circulating.unwrap_or(f64::INFINITY);
        let kb = b.ps_circulating.unwrap_or(f64::INFINITY);
        ka.total_cmp(&kb)
    });
    rows
}

/// Human-readable summary of a run, including skipped protocols.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Daily Summary ({}) ===", report.date);

    for row in summarize(&report.results, report.date) {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} ({})", row.name, row.chain);
        let _ = writeln!(out, "  Price:          ${:.4}", row.price);
        let _ = writeln!(out, "  Market Cap:     ${:.2}B", row.market_cap / 1e9);
        let _ = writeln!(out, "  Annual Revenue: ${:.2}M", row.annual_revenue / 1e6);
        match row.ps_circulating {
            Some(ps) => {
                let _ = writeln!(out, "  P/S Ratio:      {ps:.2}x");
            }
            None => {
                let _ = writeln!(out, "  P/S Ratio:      N/A");
            }
        }
        let _ = writeln!(out, "  Valuation:      {}", row.valuation);
        if let Some(trend) = row.trend {
            let _ = writeln!(
                out,
                "  P/S Change:     {:+.2}x (vs {})",
                trend.change, trend.since
            );
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out);
        for skipped in &report.skipped {
            let _ = writeln!(out, "WARNING: {} skipped: {}", skipped.name, skipped.reason);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} succeeded, {} skipped, {} not saved",
        report.results.len(),
        report.skipped.len(),
        report.unsaved_count()
    );
    out
}
