//! Domain types for ValueLab

pub mod protocol;
pub mod record;
pub mod snapshot;

pub use protocol::{
    builtin_protocols, ProtocolDescriptor, ProtocolTable, ProtocolTableError, RevenuePlan,
};
pub use record::{DailySnapshotRecord, HistoryPoint};
pub use snapshot::{
    annualize_30d, resolve_market_cap, MarketCapSource, MarketSnapshot, RevenueSnapshot,
    RevenueSource,
};
