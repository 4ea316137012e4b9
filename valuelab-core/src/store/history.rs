//! SQLite history of daily snapshots.
//!
//! One row per `(date, protocol)`. A repeated write for the same key replaces
//! the whole row in a single statement, so readers never see a partial record.
//! The schema is created on open if it does not exist; there are no migrations.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::data::DataError;
use crate::domain::DailySnapshotRecord;
use crate::valuation::Valuation;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS daily_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        protocol TEXT NOT NULL,
        price REAL,
        market_cap REAL,
        fdv REAL,
        circulating_supply REAL,
        total_supply REAL,
        max_supply REAL,
        daily_revenue REAL,
        revenue_7d REAL,
        revenue_30d REAL,
        annual_revenue REAL,
        ps_circulating REAL,
        ps_fdv REAL,
        valuation TEXT,
        timestamp TEXT,
        UNIQUE(date, protocol)
    );
"#;

const SELECT_COLUMNS: &str = "date, protocol, price, market_cap, fdv, circulating_supply, \
     total_supply, max_supply, daily_revenue, revenue_7d, revenue_30d, annual_revenue, \
     ps_circulating, ps_fdv, valuation, timestamp";

/// Durable storage for daily records.
pub trait SnapshotStore: Send + Sync {
    /// Insert the record, or replace the existing record with the same
    /// `(date, protocol)` key.
    fn upsert(&self, record: &DailySnapshotRecord) -> Result<(), DataError>;

    /// Up to `limit` most recent records for `protocol`, oldest first.
    fn read_recent(
        &self,
        protocol: &str,
        limit: usize,
    ) -> Result<Vec<DailySnapshotRecord>, DataError>;
}

/// SQLite-backed [`SnapshotStore`].
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (creating if needed) the database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, DataError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DataError::StorageWrite(format!("create {}: {e}", parent.display()))
                })?;
            }
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| DataError::StorageWrite(format!("open {}: {e}", path.display())))?;
        Self::init(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, DataError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DataError::StorageWrite(format!("open in-memory db: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DataError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| DataError::StorageWrite(format!("create schema: {e}")))?;
        check_columns(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DataError> {
        self.conn
            .lock()
            .map_err(|_| DataError::StorageRead("connection lock poisoned".into()))
    }

    /// Fetch the record stored under one key.
    pub fn get(
        &self,
        date: NaiveDate,
        protocol: &str,
    ) -> Result<Option<DailySnapshotRecord>, DataError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM daily_snapshots WHERE date = ?1 AND protocol = ?2"
            ))
            .map_err(read_err)?;
        let mut rows = stmt
            .query(params![date.format(DATE_FORMAT).to_string(), protocol])
            .map_err(read_err)?;
        let record = match rows.next().map_err(read_err)? {
            Some(row) => Some(record_from_row(row)?),
            None => None,
        };
        Ok(record)
    }

    /// Total number of rows.
    pub fn count(&self) -> Result<usize, DataError> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM daily_snapshots", [], |row| row.get(0))
            .map_err(read_err)?;
        Ok(n as usize)
    }
}

impl SnapshotStore for HistoryStore {
    fn upsert(&self, record: &DailySnapshotRecord) -> Result<(), DataError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DataError::StorageWrite("connection lock poisoned".into()))?;
        conn.execute(
            "INSERT OR REPLACE INTO daily_snapshots
             (date, protocol, price, market_cap, fdv, circulating_supply, total_supply,
              max_supply, daily_revenue, revenue_7d, revenue_30d, annual_revenue,
              ps_circulating, ps_fdv, valuation, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.date.format(DATE_FORMAT).to_string(),
                &record.protocol,
                record.price,
                record.market_cap,
                record.fdv,
                record.circulating_supply,
                record.total_supply,
                record.max_supply,
                record.daily_revenue,
                record.revenue_7d,
                record.revenue_30d,
                record.annual_revenue,
                record.ps_circulating,
                record.ps_fdv,
                record.valuation.label(),
                record.captured_at.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )
        .map_err(|e| DataError::StorageWrite(e.to_string()))?;
        Ok(())
    }

    fn read_recent(
        &self,
        protocol: &str,
        limit: usize,
    ) -> Result<Vec<DailySnapshotRecord>, DataError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM daily_snapshots
                 WHERE protocol = ?1
                 ORDER BY date DESC
                 LIMIT ?2"
            ))
            .map_err(read_err)?;
        let mut rows = stmt
            .query(params![protocol, limit as i64])
            .map_err(read_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(read_err)? {
            records.push(record_from_row(row)?);
        }
        records.reverse();
        Ok(records)
    }
}

/// Reject a pre-existing table that lacks columns this store writes.
/// `CREATE TABLE IF NOT EXISTS` leaves such a table untouched.
fn check_columns(conn: &Connection) -> Result<(), DataError> {
    let schema_err = |e: rusqlite::Error| DataError::StorageWrite(format!("inspect schema: {e}"));
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('daily_snapshots')")
        .map_err(schema_err)?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(schema_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(schema_err)?;

    let missing: Vec<&str> = SELECT_COLUMNS
        .split(',')
        .map(str::trim)
        .filter(|col| !present.iter().any(|p| p == col))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::StorageWrite(format!(
            "daily_snapshots table has an incompatible schema (missing columns: {}); \
             point the store at a new database file",
            missing.join(", ")
        )))
    }
}

fn read_err(e: rusqlite::Error) -> DataError {
    DataError::StorageRead(e.to_string())
}

fn record_from_row(row: &Row<'_>) -> Result<DailySnapshotRecord, DataError> {
    let date: String = row.get(0).map_err(read_err)?;
    let valuation: String = row.get(14).map_err(read_err)?;
    let timestamp: String = row.get(15).map_err(read_err)?;
    let real = |idx: usize| -> Result<f64, DataError> {
        Ok(row.get::<_, Option<f64>>(idx).map_err(read_err)?.unwrap_or(0.0))
    };
    let optional = |idx: usize| -> Result<Option<f64>, DataError> {
        row.get::<_, Option<f64>>(idx).map_err(read_err)
    };

    Ok(DailySnapshotRecord {
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| DataError::StorageRead(format!("bad date '{date}': {e}")))?,
        protocol: row.get(1).map_err(read_err)?,
        price: real(2)?,
        market_cap: real(3)?,
        fdv: real(4)?,
        circulating_supply: optional(5)?,
        total_supply: optional(6)?,
        max_supply: optional(7)?,
        daily_revenue: real(8)?,
        revenue_7d: real(9)?,
        revenue_30d: real(10)?,
        annual_revenue: real(11)?,
        ps_circulating: optional(12)?,
        ps_fdv: optional(13)?,
        valuation: valuation
            .parse::<Valuation>()
            .map_err(|e| DataError::StorageRead(e.to_string()))?,
        captured_at: NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| DataError::StorageRead(format!("bad timestamp '{timestamp}': {e}")))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn record(d: u32, protocol: &str, price: f64) -> DailySnapshotRecord {
        DailySnapshotRecord {
            date: day(d),
            protocol: protocol.into(),
            price,
            market_cap: 50_000_000.0,
            fdv: 80_000_000.0,
            circulating_supply: Some(1_000_000.0),
            total_supply: None,
            max_supply: None,
            daily_revenue: 10_000.0,
            revenue_7d: 70_000.0,
            revenue_30d: 300_000.0,
            annual_revenue: 3_650_000.0,
            ps_circulating: Some(13.7),
            ps_fdv: Some(21.92),
            valuation: Valuation::FairValue,
            captured_at: day(d).and_hms_milli_opt(9, 30, 0, 250).unwrap(),
        }
    }

    #[test]
    fn upsert_and_get() {
        let store = HistoryStore::open_in_memory().unwrap();
        let r = record(1, "Aave", 250.0);
        store.upsert(&r).unwrap();
        assert_eq!(store.get(day(1), "Aave").unwrap(), Some(r));
        assert_eq!(store.get(day(2), "Aave").unwrap(), None);
    }

    #[test]
    fn repeated_key_replaces_row() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.upsert(&record(1, "Aave", 250.0)).unwrap();
        store.upsert(&record(1, "Aave", 260.0)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(day(1), "Aave").unwrap().unwrap().price, 260.0);
    }

    #[test]
    fn absent_ratios_round_trip_as_null() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut r = record(1, "Pump.fun", 0.01);
        r.ps_circulating = None;
        r.ps_fdv = None;
        r.valuation = Valuation::NoRevenue;
        store.upsert(&r).unwrap();
        let back = store.get(day(1), "Pump.fun").unwrap().unwrap();
        assert_eq!(back.ps_circulating, None);
        assert_eq!(back.valuation, Valuation::NoRevenue);
    }

    #[test]
    fn read_recent_is_bounded_and_ascending() {
        let store = HistoryStore::open_in_memory().unwrap();
        for d in [3, 1, 5, 2, 4] {
            store.upsert(&record(d, "Aave", d as f64)).unwrap();
        }
        store.upsert(&record(5, "Ethena", 1.0)).unwrap();

        let recent = store.read_recent("Aave", 3).unwrap();
        let dates: Vec<_> = recent.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(3), day(4), day(5)]);
        assert!(recent.iter().all(|r| r.protocol == "Aave"));
    }

    #[test]
    fn read_recent_without_history_is_empty() {
        let store = HistoryStore::open_in_memory().unwrap();
        assert!(store.read_recent("Nobody", 90).unwrap().is_empty());
        store.upsert(&record(1, "Aave", 1.0)).unwrap();
        assert!(store.read_recent("Aave", 0).unwrap().is_empty());
    }

    #[test]
    fn open_rejects_table_without_supply_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE daily_snapshots (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    protocol TEXT NOT NULL,
                    price REAL,
                    market_cap REAL,
                    fdv REAL,
                    daily_revenue REAL,
                    revenue_7d REAL,
                    revenue_30d REAL,
                    annual_revenue REAL,
                    ps_circulating REAL,
                    ps_fdv REAL,
                    valuation TEXT,
                    timestamp TEXT,
                    UNIQUE(date, protocol)
                );",
            )
            .unwrap();

        match HistoryStore::open(&path) {
            Err(DataError::StorageWrite(msg)) => {
                assert!(msg.contains("circulating_supply"), "{msg}");
                assert!(msg.contains("max_supply"), "{msg}");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("legacy schema accepted"),
        }
    }

    #[test]
    fn reopening_keeps_rows_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        {
            let store = HistoryStore::open(&path).unwrap();
            store.upsert(&record(1, "Aave", 250.0)).unwrap();
        }
        let store = HistoryStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
