//! Pool Sentinel Library
//!
//! Detects hijacked mining-pool payouts: decodes `mining.notify` work from
//! miner logs, extracts the coinbase payout outputs and checks them against
//! an approved baseline per pool identity.

pub mod alerts;
pub mod clock;
pub mod codec;
pub mod coinbase;
pub mod config;
pub mod monitor;
pub mod store;
pub mod stratum;
pub mod types;
pub mod verify;

// Re-export commonly used types
pub use alerts::{AlertSink, BroadcastAlertSink, DiscordAlertSink, MultiSink};
pub use config::{load_config, MonitorConfig};
pub use monitor::{BatchReport, MonitorDeps, MonitorError, PoolMonitoringService};
pub use store::{MemoryStore, Snapshot};
pub use types::{
    AlertSeverity, BitcoinOutput, LogLine, MinerRecord, PoolAlertEvent, PoolApproval, PoolEndpoint, PoolIdentity,
    ScriptType,
};
