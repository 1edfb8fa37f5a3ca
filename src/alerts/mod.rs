//! Alert Delivery
//!
//! Purpose:
//!     Publish PoolAlertEvents to UI / notification consumers.
//!
//! Architecture:
//!     mod.rs       — AlertSink trait, MultiSink fan-out
//!     broadcast.rs — in-process observable alert stream (tokio broadcast)
//!     discord.rs   — Discord webhook embeds
//!
//! Sinks are injected into the monitor; delivery failures are logged by
//! the caller and never block validation of the remaining events.

pub mod broadcast;
pub mod discord;

pub use broadcast::{forward_alerts, BroadcastAlertSink};
pub use discord::DiscordAlertSink;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

use crate::types::PoolAlertEvent;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alert: &PoolAlertEvent) -> Result<()>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Delivers each alert to every inner sink concurrently; one failing sink
/// does not stop the others.
#[derive(Default, Clone)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AlertSink for MultiSink {
    async fn publish(&self, alert: &PoolAlertEvent) -> Result<()> {
        let results = join_all(self.sinks.iter().map(|sink| sink.publish(alert))).await;
        for (sink, result) in self.sinks.iter().zip(results) {
            if let Err(e) = result {
                warn!("Alert sink {} failed for alert {}: {:#}", sink.name(), alert.id, e);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "multi"
    }
}
