//! ValueLab Runner: daily run orchestration, configuration and export.
//!
//! This crate builds on `valuelab-core` to provide:
//! - TOML configuration with defaults and protocol-table validation
//! - The sequential daily pipeline (fetch, normalize, ratio, persist, history)
//! - Sorted run summaries
//! - JSON export for the dashboard and CSV history dumps

pub mod config;
pub mod export;
pub mod pipeline;
pub mod summary;

pub use config::{ConfigError, TrackerConfig};
pub use export::{export_json, history_csv, write_export};
pub use pipeline::{Pipeline, PipelineSettings, ProtocolResult, RunReport, SkippedProtocol};
pub use summary::{render_summary, summarize, RatioChange, SummaryRow};
