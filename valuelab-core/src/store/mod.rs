//! Durable history of daily snapshots

pub mod history;

pub use history::{HistoryStore, SnapshotStore};
