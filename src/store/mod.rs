//! Record Store Interfaces
//!
//! Purpose:
//!     Narrow async seams onto the external persistence engine. The monitor
//!     only ever sees these traits; the engine behind them is injected.
//!
//! Architecture:
//!     mod.rs       — PoolApprovalStore, AlertStore, MinerDirectory traits
//!     memory.rs    — in-process implementation of all three (DashMap-backed)
//!     json_file.rs — atomic JSON snapshot used to seed/persist MemoryStore

pub mod json_file;
pub mod memory;

pub use json_file::Snapshot;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::types::{MinerPoolContext, PoolAlertEvent, PoolApproval, PoolIdentity};

/// Approved-output baselines, one per pool identity
#[async_trait]
pub trait PoolApprovalStore: Send + Sync {
    async fn approval(&self, identity: &PoolIdentity) -> Result<Option<PoolApproval>>;

    /// Insert or replace the baseline for `approval.identity`
    async fn upsert_approval(&self, approval: PoolApproval) -> Result<()>;
}

/// Append-only alert history
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Miners with any alert for `identity` detected at or after `since`
    async fn miners_alerted_since(&self, identity: &PoolIdentity, since: DateTime<Utc>) -> Result<HashSet<String>>;

    async fn append_alert(&self, alert: PoolAlertEvent) -> Result<()>;

    /// Mark an alert dismissed. Returns false when no alert has this id.
    async fn dismiss_alert(&self, id: Uuid, at: DateTime<Utc>, notes: Option<String>) -> Result<bool>;

    /// Alerts, newest first
    async fn alerts(&self, include_dismissed: bool) -> Result<Vec<PoolAlertEvent>>;
}

/// Device registry lookup of a miner's currently active pool
#[async_trait]
pub trait MinerDirectory: Send + Sync {
    async fn active_pool(&self, miner_id: &str) -> Result<Option<MinerPoolContext>>;
}
