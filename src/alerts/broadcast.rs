//! Observable alert stream
//!
//! Wraps a tokio broadcast channel. Publishing with no subscribers is not
//! an error; late subscribers only see alerts raised after they subscribe.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{trace, warn};

use super::AlertSink;
use crate::types::PoolAlertEvent;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct BroadcastAlertSink {
    sender: Sender<PoolAlertEvent>,
}

impl Default for BroadcastAlertSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastAlertSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolAlertEvent> {
        self.sender.subscribe()
    }

    /// Alert stream for consumers that prefer `Stream` combinators.
    /// Lagged receivers yield `Err(Lagged)` items rather than ending.
    pub fn stream(&self) -> BroadcastStream<PoolAlertEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Hand every alert from `receiver` to `handle` until all senders are gone.
/// A receiver that falls behind skips the overwritten alerts and carries on.
/// Returns the number of skipped alerts.
pub async fn forward_alerts<F>(mut receiver: broadcast::Receiver<PoolAlertEvent>, mut handle: F) -> u64
where
    F: FnMut(PoolAlertEvent),
{
    let mut skipped = 0;
    loop {
        match receiver.recv().await {
            Ok(alert) => handle(alert),
            Err(RecvError::Lagged(n)) => {
                warn!("Alert consumer fell behind, {} alerts skipped", n);
                skipped += n;
            }
            Err(RecvError::Closed) => break,
        }
    }
    skipped
}

#[async_trait]
impl AlertSink for BroadcastAlertSink {
    async fn publish(&self, alert: &PoolAlertEvent) -> Result<()> {
        match self.sender.send(alert.clone()) {
            Ok(n) => trace!("Alert {} delivered to {} subscribers", alert.id, n),
            Err(_) => trace!("Alert {} published with no subscribers", alert.id),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertSeverity, PoolIdentity};
    use chrono::Utc;
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    fn alert() -> PoolAlertEvent {
        PoolAlertEvent {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            miner_id: "m1".to_string(),
            miner_hostname: "s19".to_string(),
            miner_ip: "10.0.0.3".to_string(),
            pool_identity: PoolIdentity::new("pool", 3333, "acct"),
            is_using_fallback_pool: false,
            expected_outputs: vec![],
            actual_outputs: vec![],
            severity: AlertSeverity::Critical,
            reason: "output count mismatch".to_string(),
            is_dismissed: false,
            dismissed_at: None,
            notes: None,
            raw_message: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_alerts() {
        let sink = BroadcastAlertSink::default();
        let mut stream = sink.stream();
        assert_eq!(sink.subscriber_count(), 1);

        let a = alert();
        sink.publish(&a).await.unwrap();
        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.id, a.id);
    }

    #[tokio::test]
    async fn test_forwarding_survives_lag() {
        let sink = BroadcastAlertSink::new(2);
        let receiver = sink.subscribe();

        let alerts: Vec<PoolAlertEvent> = (0..5).map(|_| alert()).collect();
        for a in &alerts {
            sink.publish(a).await.unwrap();
        }
        drop(sink);

        let mut seen = Vec::new();
        let skipped = forward_alerts(receiver, |a| seen.push(a.id)).await;
        assert_eq!(skipped, 3);
        assert_eq!(seen, vec![alerts[3].id, alerts[4].id]);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let sink = BroadcastAlertSink::new(4);
        assert!(sink.publish(&alert()).await.is_ok());
    }
}
