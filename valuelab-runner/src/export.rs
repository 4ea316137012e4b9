//! Export: JSON artifact for the dashboard and CSV history dumps.
//!
//! The JSON export is a plain array of per-protocol results. It is written
//! atomically (write to `.tmp`, rename into place) so a dashboard never reads
//! a half-written file.

use std::path::Path;

use anyhow::{Context, Result};
use valuelab_core::domain::DailySnapshotRecord;

use crate::pipeline::ProtocolResult;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize run results to pretty JSON.
pub fn export_json(results: &[ProtocolResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("failed to serialize results to JSON")
}

/// Write run results to `path`, replacing any previous export.
pub fn write_export(path: &Path, results: &[ProtocolResult]) -> Result<()> {
    let json = export_json(results)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create export dir: {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        anyhow::anyhow!("atomic rename to {} failed: {e}", path.display())
    })?;
    Ok(())
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export stored history as CSV, one row per record.
pub fn history_csv(records: &[DailySnapshotRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "date",
        "protocol",
        "price",
        "market_cap",
        "fdv",
        "daily_revenue",
        "revenue_7d",
        "revenue_30d",
        "annual_revenue",
        "ps_circulating",
        "ps_fdv",
        "valuation",
        "timestamp",
    ])?;

    let opt = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_default();
    for r in records {
        let row = [
            r.date.to_string(),
            r.protocol.clone(),
            format!("{:.6}", r.price),
            format!("{:.2}", r.market_cap),
            format!("{:.2}", r.fdv),
            format!("{:.2}", r.daily_revenue),
            format!("{:.2}", r.revenue_7d),
            format!("{:.2}", r.revenue_30d),
            format!("{:.2}", r.annual_revenue),
            opt(r.ps_circulating),
            opt(r.ps_fdv),
            r.valuation.label().to_string(),
            r.captured_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ];
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use valuelab_core::valuation::Valuation;

    fn record() -> DailySnapshotRecord {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        DailySnapshotRecord {
            date,
            protocol: "Aave".into(),
            price: 250.5,
            market_cap: 50_000_000.0,
            fdv: 0.0,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            daily_revenue: 10_000.0,
            revenue_7d: 70_000.0,
            revenue_30d: 300_000.0,
            annual_revenue: 3_650_000.0,
            ps_circulating: Some(13.7),
            ps_fdv: None,
            valuation: Valuation::FairValue,
            captured_at: date.and_hms_opt(8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn history_csv_has_header_and_rows() {
        let csv = history_csv(&[record()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("date,protocol,price"));
        assert!(lines[1].starts_with("2025-06-01,Aave,250.500000"));
        assert!(lines[1].contains(",13.70,,Fair value,"));
    }

    #[test]
    fn empty_export_is_empty_array() {
        assert_eq!(export_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn write_export_fails_when_target_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_export(dir.path(), &[]).is_err());
    }
}
