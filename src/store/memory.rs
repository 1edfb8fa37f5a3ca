//! In-memory record store
//!
//! Thread-safe storage for approvals, miners and alert history.
//! Approvals and miners use DashMap keyed by identity / miner id; the alert
//! log is a single append-only Vec behind a RwLock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::json_file::Snapshot;
use super::{AlertStore, MinerDirectory, PoolApprovalStore};
use crate::types::{MinerPoolContext, MinerRecord, PoolAlertEvent, PoolApproval, PoolIdentity};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    approvals: Arc<DashMap<PoolIdentity, PoolApproval>>,
    miners: Arc<DashMap<String, MinerRecord>>,
    alerts: Arc<RwLock<Vec<PoolAlertEvent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a persisted snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for approval in snapshot.approvals {
            store.approvals.insert(approval.identity.clone(), approval);
        }
        for miner in snapshot.miners {
            store.miners.insert(miner.miner_id.clone(), miner);
        }
        *store.alerts.write() = snapshot.alerts;
        store
    }

    /// Capture the current contents for persistence
    pub fn snapshot(&self) -> Snapshot {
        let mut approvals: Vec<PoolApproval> = self.approvals.iter().map(|e| e.value().clone()).collect();
        approvals.sort_by(|a, b| a.identity.cmp(&b.identity));
        let mut miners: Vec<MinerRecord> = self.miners.iter().map(|e| e.value().clone()).collect();
        miners.sort_by(|a, b| a.miner_id.cmp(&b.miner_id));
        Snapshot {
            approvals,
            alerts: self.alerts.read().clone(),
            miners,
        }
    }

    pub fn upsert_miner(&self, miner: MinerRecord) {
        self.miners.insert(miner.miner_id.clone(), miner);
    }

    /// Record the miner's latest fallback flag. Returns false for unknown miners.
    pub fn set_fallback_flag(&self, miner_id: &str, using_fallback: bool) -> bool {
        match self.miners.get_mut(miner_id) {
            Some(mut miner) => {
                miner.is_using_fallback = using_fallback;
                true
            }
            None => false,
        }
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.read().len()
    }
}

#[async_trait]
impl PoolApprovalStore for MemoryStore {
    async fn approval(&self, identity: &PoolIdentity) -> Result<Option<PoolApproval>> {
        Ok(self.approvals.get(identity).map(|e| e.value().clone()))
    }

    async fn upsert_approval(&self, approval: PoolApproval) -> Result<()> {
        debug!(
            "Upserting approval for {} ({} outputs, auto={})",
            approval.identity,
            approval.approved_outputs.len(),
            approval.is_auto_approved
        );
        self.approvals.insert(approval.identity.clone(), approval);
        Ok(())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn miners_alerted_since(&self, identity: &PoolIdentity, since: DateTime<Utc>) -> Result<HashSet<String>> {
        Ok(self
            .alerts
            .read()
            .iter()
            .filter(|a| &a.pool_identity == identity && a.detected_at >= since)
            .map(|a| a.miner_id.clone())
            .collect())
    }

    async fn append_alert(&self, alert: PoolAlertEvent) -> Result<()> {
        self.alerts.write().push(alert);
        Ok(())
    }

    async fn dismiss_alert(&self, id: Uuid, at: DateTime<Utc>, notes: Option<String>) -> Result<bool> {
        let mut alerts = self.alerts.write();
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            return Ok(false);
        };
        if !alert.is_dismissed {
            alert.is_dismissed = true;
            alert.dismissed_at = Some(at);
        }
        if notes.is_some() {
            alert.notes = notes;
        }
        Ok(true)
    }

    async fn alerts(&self, include_dismissed: bool) -> Result<Vec<PoolAlertEvent>> {
        let mut alerts: Vec<PoolAlertEvent> = self
            .alerts
            .read()
            .iter()
            .filter(|a| include_dismissed || !a.is_dismissed)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(alerts)
    }
}

#[async_trait]
impl MinerDirectory for MemoryStore {
    async fn active_pool(&self, miner_id: &str) -> Result<Option<MinerPoolContext>> {
        Ok(self.miners.get(miner_id).map(|m| m.active_pool()))
    }
}
