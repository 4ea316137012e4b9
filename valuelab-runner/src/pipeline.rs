//! Pipeline orchestrator: runs every configured protocol through
//! fetch → normalize → ratio → persist → history, one protocol at a time.
//!
//! Per-protocol terminal states are Success and Skipped. A failed market or
//! revenue fetch skips the protocol; a failed history write does not (the
//! result is still reported, flagged `saved = false`). After every protocol
//! the pipeline pauses for the pacing interval, whatever the outcome.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use valuelab_core::data::{DataError, MarketDataSource, RevenueDataSource};
use valuelab_core::domain::{
    DailySnapshotRecord, HistoryPoint, MarketCapSource, MarketSnapshot, ProtocolDescriptor,
    ProtocolTable, RevenuePlan, RevenueSnapshot,
};
use valuelab_core::store::SnapshotStore;
use valuelab_core::valuation::{self, RatioResult};

/// Granularity of interruptible pauses.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub history_days: usize,
    pub pacing: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            history_days: 90,
            pacing: Duration::from_millis(1500),
        }
    }
}

/// One successfully processed protocol, as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolResult {
    pub key: String,
    pub name: String,
    pub chain: String,
    pub category: String,
    #[serde(flatten)]
    pub market: MarketSnapshot,
    #[serde(flatten)]
    pub revenue: RevenueSnapshot,
    #[serde(flatten)]
    pub ratio: RatioResult,
    pub timestamp: NaiveDateTime,
    /// Whether the daily record reached the history store.
    pub saved: bool,
    /// Recent history, oldest first (includes today's record when saved).
    pub historical: Vec<HistoryPoint>,
}

/// A protocol that produced no result this run.
#[derive(Debug)]
pub struct SkippedProtocol {
    pub key: String,
    pub name: String,
    pub reason: DataError,
}

/// Outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    pub results: Vec<ProtocolResult>,
    pub skipped: Vec<SkippedProtocol>,
    /// The operator asked to stop before every protocol was attempted.
    pub interrupted: bool,
}

impl RunReport {
    /// A run succeeds when at least one protocol succeeded.
    pub fn is_success(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn unsaved_count(&self) -> usize {
        self.results.iter().filter(|r| !r.saved).count()
    }
}

pub struct Pipeline<'a> {
    protocols: &'a ProtocolTable,
    market: &'a dyn MarketDataSource,
    revenue: &'a dyn RevenueDataSource,
    store: &'a dyn SnapshotStore,
    settings: PipelineSettings,
    stop: Option<&'a AtomicBool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        protocols: &'a ProtocolTable,
        market: &'a dyn MarketDataSource,
        revenue: &'a dyn RevenueDataSource,
        store: &'a dyn SnapshotStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            protocols,
            market,
            revenue,
            store,
            settings,
            stop: None,
        }
    }

    /// Check `stop` before each protocol and during pacing pauses. A stop
    /// raised after the last protocol started does not mark the run
    /// interrupted.
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Run for today's date on the local clock.
    pub fn run(&self) -> RunReport {
        self.run_on(chrono::Local::now().date_naive())
    }

    /// Run, keying every record by `date`.
    pub fn run_on(&self, date: NaiveDate) -> RunReport {
        let total = self.protocols.len();
        let mut report = RunReport {
            date,
            results: Vec::with_capacity(total),
            skipped: Vec::new(),
            interrupted: false,
        };

        info!(%date, protocols = total, "starting daily valuation run");

        for (i, protocol) in self.protocols.iter().enumerate() {
            if self.stop_requested() {
                warn!(remaining = total - i, "stop requested, ending run early");
                report.interrupted = true;
                break;
            }

            info!(
                protocol = %protocol.name,
                "[{}/{}] fetching",
                i + 1,
                total
            );

            match self.process(protocol, date) {
                Ok(result) => report.results.push(result),
                Err(reason) => {
                    warn!(protocol = %protocol.name, error = %reason, "protocol skipped");
                    report.skipped.push(SkippedProtocol {
                        key: protocol.key.clone(),
                        name: protocol.name.clone(),
                        reason,
                    });
                }
            }

            self.pause();
        }

        info!(
            succeeded = report.results.len(),
            skipped = report.skipped.len(),
            unsaved = report.unsaved_count(),
            interrupted = report.interrupted,
            "run complete"
        );
        report
    }

    fn process(
        &self,
        protocol: &ProtocolDescriptor,
        date: NaiveDate,
    ) -> Result<ProtocolResult, DataError> {
        let market = self.fetch_market(protocol)?;
        let revenue = self.fetch_revenue(protocol)?;

        let ratio = valuation::compute(market.market_cap, market.fdv, revenue.annual_revenue);
        info!(
            protocol = %protocol.name,
            ps_circulating = ?ratio.ps_circulating,
            ps_fdv = ?ratio.ps_fdv,
            valuation = %ratio.valuation,
            "ratio computed"
        );

        let captured_at = chrono::Local::now().naive_local();
        let record = DailySnapshotRecord::assemble(
            date,
            &protocol.name,
            &market,
            &revenue,
            &ratio,
            captured_at,
        );

        let saved = match self.store.upsert(&record) {
            Ok(()) => {
                debug!(protocol = %protocol.name, %date, "snapshot saved");
                true
            }
            Err(e) => {
                error!(protocol = %protocol.name, %date, error = %e, "snapshot NOT saved");
                false
            }
        };

        let historical = match self
            .store
            .read_recent(&protocol.name, self.settings.history_days)
        {
            Ok(records) => records.iter().map(HistoryPoint::from).collect(),
            Err(e) => {
                warn!(protocol = %protocol.name, error = %e, "history unavailable");
                Vec::new()
            }
        };

        Ok(ProtocolResult {
            key: protocol.key.clone(),
            name: protocol.name.clone(),
            chain: protocol.chain.clone(),
            category: protocol.category.clone(),
            market,
            revenue,
            ratio,
            timestamp: captured_at,
            saved,
            historical,
        })
    }

    fn fetch_market(&self, protocol: &ProtocolDescriptor) -> Result<MarketSnapshot, DataError> {
        let normalized = self.market.market_snapshot(&protocol.valuation_id)?;
        if !normalized.defaulted.is_empty() {
            debug!(
                protocol = %protocol.name,
                source = self.market.name(),
                fields = ?normalized.defaulted,
                "market fields defaulted"
            );
        }
        let market = normalized.value;
        if market.market_cap_source == MarketCapSource::FdvFallback {
            warn!(
                protocol = %protocol.name,
                fdv = market.fdv,
                "market cap reported as zero, using fully-diluted valuation"
            );
        }
        info!(protocol = %protocol.name, price = market.price, "market snapshot");
        Ok(market)
    }

    fn fetch_revenue(&self, protocol: &ProtocolDescriptor) -> Result<RevenueSnapshot, DataError> {
        let revenue = match protocol.revenue_plan() {
            RevenuePlan::Manual(annual) => {
                info!(protocol = %protocol.name, annual, "using manual annual revenue");
                RevenueSnapshot::from_manual_annual(annual)
            }
            RevenuePlan::Endpoint(slug) => {
                let normalized = self.revenue.revenue_snapshot(slug)?;
                if !normalized.defaulted.is_empty() {
                    debug!(
                        protocol = %protocol.name,
                        source = self.revenue.name(),
                        fields = ?normalized.defaulted,
                        "revenue fields defaulted"
                    );
                }
                normalized.value
            }
            RevenuePlan::Missing => {
                return Err(DataError::ConfigurationGap {
                    protocol: protocol.key.clone(),
                })
            }
        };
        info!(
            protocol = %protocol.name,
            annual_revenue = revenue.annual_revenue,
            "revenue snapshot"
        );
        Ok(revenue)
    }

    fn stop_requested(&self) -> bool {
        self.stop.is_some_and(|s| s.load(Ordering::SeqCst))
    }

    /// Sleep for the pacing interval, returning early if a stop is requested.
    fn pause(&self) {
        let deadline = Instant::now() + self.settings.pacing;
        loop {
            if self.stop_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }
}
