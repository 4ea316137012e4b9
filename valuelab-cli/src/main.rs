//! ValueLab CLI: daily protocol valuation run and history inspection.
//!
//! Commands:
//! - `run`: fetch, value and store every configured protocol, then export JSON
//! - `history`: print (or dump as CSV) the stored window for one protocol
//! - `protocols`: list the configured protocol table
//!
//! Exit codes: 0 on success, 1 when no protocol succeeded, the export failed
//! or a fatal error occurred, 130 when interrupted with Ctrl-C.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use valuelab_core::data::{
    CoinGeckoProvider, DefiLlamaProvider, ReqwestTransport, ResilientFetcher,
};
use valuelab_core::domain::RevenuePlan;
use valuelab_core::store::{HistoryStore, SnapshotStore};
use valuelab_runner::{history_csv, render_summary, write_export, Pipeline, TrackerConfig};

const EXIT_FAILURE: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "valuelab",
    about = "ValueLab: daily price-to-revenue tracker for crypto protocols"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily valuation pipeline and write the JSON export.
    Run {
        /// Path to a TOML config file. Defaults to built-in settings.
        #[arg(long)]
        config: Option<PathBuf>,

        /// History database path (overrides config).
        #[arg(long)]
        db: Option<PathBuf>,

        /// JSON export path (overrides config).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show stored history for one protocol.
    History {
        /// Protocol key or display name.
        protocol: String,

        /// Number of most recent days to show.
        #[arg(long, default_value_t = 30)]
        days: usize,

        /// Also write the window as CSV to this path.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// History database path (overrides config).
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List the configured protocols.
    Protocols {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Run { config, db, output } => run_daily(config, db, output),
        Commands::History {
            protocol,
            days,
            csv,
            config,
            db,
        } => run_history(&protocol, days, csv, config, db).map(|()| ExitCode::SUCCESS),
        Commands::Protocols { config } => run_protocols(config).map(|()| ExitCode::SUCCESS),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    match path {
        Some(path) => TrackerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(TrackerConfig::default()),
    }
}

/// Spawn a watcher that raises `stop` on the first Ctrl-C and exits the
/// process on the second.
fn install_interrupt_handler(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;

    std::thread::Builder::new()
        .name("valuelab-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("interrupt received, finishing current protocol (Ctrl-C again to abort)");
                stop.store(true, Ordering::SeqCst);

                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(i32::from(EXIT_INTERRUPTED));
                }
            });
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}

fn run_daily(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(db) = db {
        config.storage.database = db;
    }
    if let Some(output) = output {
        config.storage.export = output;
    }
    let protocols = config.protocol_table()?;

    let transport = ReqwestTransport::new(&config.fetch.user_agent)
        .map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;
    let fetcher = ResilientFetcher::new(Arc::new(transport), config.fetch.retry_policy());
    let market = CoinGeckoProvider::new(
        fetcher.clone(),
        &config.endpoints.valuation_base,
        config.fetch.timeout(),
    );
    let revenue = DefiLlamaProvider::new(
        fetcher,
        &config.endpoints.revenue_base,
        config.fetch.timeout(),
    );
    let store = HistoryStore::open(&config.storage.database).with_context(|| {
        format!(
            "opening history database {}",
            config.storage.database.display()
        )
    })?;

    let stop = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&stop))?;

    let report = Pipeline::new(
        &protocols,
        &market,
        &revenue,
        &store,
        config.pipeline_settings(),
    )
    .with_stop_flag(&stop)
    .run();

    println!("{}", render_summary(&report));

    if report.interrupted {
        warn!("run interrupted, export skipped");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    if !report.is_success() {
        error!(
            skipped = report.skipped.len(),
            "no protocol produced a result, export skipped"
        );
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    if let Err(e) = write_export(&config.storage.export, &report.results) {
        error!("export failed: {e:#}");
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    info!(
        path = %config.storage.export.display(),
        results = report.results.len(),
        "export written"
    );

    Ok(ExitCode::SUCCESS)
}

fn run_history(
    key_or_name: &str,
    days: usize,
    csv_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let protocols = config.protocol_table()?;
    let protocol = protocols
        .find(key_or_name)
        .ok_or_else(|| anyhow!("unknown protocol '{key_or_name}'"))?;

    let db_path = db.unwrap_or(config.storage.database);
    let store = HistoryStore::open(&db_path)
        .with_context(|| format!("opening history database {}", db_path.display()))?;
    let records = store.read_recent(&protocol.name, days)?;

    if records.is_empty() {
        println!("No history for {} in {}", protocol.name, db_path.display());
        return Ok(());
    }

    println!("{} ({}), last {} records", protocol.name, protocol.chain, records.len());
    println!(
        "{:<12} {:>14} {:>10} {:>14}  Valuation",
        "Date", "Price", "P/S", "Revenue ($M)"
    );
    for r in &records {
        let ps = r
            .ps_circulating
            .map(|v| format!("{v:.2}x"))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{:<12} {:>14.4} {:>10} {:>14.2}  {}",
            r.date,
            r.price,
            ps,
            r.annual_revenue / 1e6,
            r.valuation
        );
    }

    if let Some(path) = csv_path {
        let csv = history_csv(&records)?;
        std::fs::write(&path, csv).with_context(|| format!("writing {}", path.display()))?;
        println!("CSV written to: {}", path.display());
    }

    Ok(())
}

fn run_protocols(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let protocols = config.protocol_table()?;

    println!(
        "{:<14} {:<14} {:<16} {:<14} Revenue",
        "Key", "Name", "Chain", "Category"
    );
    for p in protocols.iter() {
        let source = match p.revenue_plan() {
            RevenuePlan::Manual(annual) => format!("manual ${:.2}M/yr", annual / 1e6),
            RevenuePlan::Endpoint(slug) => format!("fees/{slug}"),
            RevenuePlan::Missing => "none".to_string(),
        };
        println!(
            "{:<14} {:<14} {:<16} {:<14} {}",
            p.key, p.name, p.chain, p.category, source
        );
    }
    Ok(())
}
