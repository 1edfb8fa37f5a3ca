//! Pool Monitoring Service
//!
//! Purpose:
//!     Watch every subscribed miner's log stream for `mining.notify` work,
//!     decode the coinbase payout outputs, and validate them in debounced
//!     batches against the approved baseline of the miner's active pool.
//!
//! Architecture:
//!     queue.rs   — shared pending-event queue + debounce generation token
//!     service.rs — lifecycle, per-miner listeners, batch validation
//!
//! Data flow:
//!     log line → stratum decode → coinbase parse → queue
//!       → (500 ms quiet) → drain → resolve active pool per event
//!       → group by pool → 1 approval read + 1 alert-history read per group
//!       → compare / classify → alert write + publish

pub mod queue;
pub mod service;

pub use queue::{PendingEvent, PendingQueue};
pub use service::{BatchReport, LogStream, MonitorDeps, PoolMonitoringService};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("monitor is not running")]
    NotRunning,
    #[error("miner {0} is already subscribed")]
    AlreadySubscribed(String),
}
