//! Pool Monitoring Service
//!
//! Purpose:
//!     Own the per-miner listeners, the debounced queue and the batch
//!     validator. Constructed explicitly with its collaborators; nothing
//!     here is process-global.
//!
//! Design:
//!     - One spawned listener per subscribed miner (aborted on unsubscribe)
//!     - Every enqueue schedules a timer tagged with the queue generation;
//!       only the timer holding the latest generation drains the queue
//!     - The drain releases the queue lock before any store I/O, so
//!       ingestion never waits on validation
//!     - Validation rounds run one at a time, so a round always sees the
//!       alerts written by the round before it
//!     - Store reads are amortised per pool: one approval read and one
//!       alert-history read per pool identity per batch
//!     - A store failure aborts only the affected pool's sub-batch
//!
//! Notes:
//!     Unsubscribing does not retract events already queued for that miner;
//!     a late alert for a just-removed miner is harmless.

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::queue::{PendingEvent, PendingQueue};
use super::MonitorError;
use crate::alerts::AlertSink;
use crate::clock::Clock;
use crate::coinbase::parse_coinbase;
use crate::config::MonitorConfig;
use crate::store::{AlertStore, MinerDirectory, PoolApprovalStore};
use crate::stratum::{decode_notify_line, is_stratum_component};
use crate::types::{LogLine, MinerPoolContext, PoolAlertEvent, PoolApproval, PoolIdentity};
use crate::verify::{OutputComparator, SeverityClassifier};

/// Raw log lines of one miner
pub type LogStream = Pin<Box<dyn Stream<Item = LogLine> + Send>>;

/// Injected collaborators
#[derive(Clone)]
pub struct MonitorDeps {
    pub approvals: Arc<dyn PoolApprovalStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub miners: Arc<dyn MinerDirectory>,
    pub sink: Arc<dyn AlertSink>,
    pub clock: Arc<dyn Clock>,
}

/// Outcome of one validation round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Events drained from the queue
    pub received: usize,
    /// Events whose miner could not be resolved to an active pool
    pub dropped: usize,
    /// Distinct pool identities in the batch
    pub groups: usize,
    /// Groups aborted by a store failure
    pub groups_failed: usize,
    /// Events for pools with no approved baseline
    pub unapproved: usize,
    pub matched: usize,
    pub throttled: usize,
    pub alerts_raised: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: &BatchReport) {
        self.received += other.received;
        self.dropped += other.dropped;
        self.groups += other.groups;
        self.groups_failed += other.groups_failed;
        self.unapproved += other.unapproved;
        self.matched += other.matched;
        self.throttled += other.throttled;
        self.alerts_raised += other.alerts_raised;
    }
}

/// State shared between the service handle, listeners and debounce timers
struct MonitorCore {
    config: MonitorConfig,
    deps: MonitorDeps,
    comparator: OutputComparator,
    classifier: SeverityClassifier,
    queue: PendingQueue,
    /// Held for the whole of a validation round
    validation: Mutex<()>,
    running: AtomicBool,
}

pub struct PoolMonitoringService {
    core: Arc<MonitorCore>,
    listeners: DashMap<String, JoinHandle<()>>,
}

impl PoolMonitoringService {
    pub fn new(config: MonitorConfig, deps: MonitorDeps) -> Self {
        let comparator = OutputComparator::new(config.value_tolerance);
        let classifier = SeverityClassifier::new(config.value_tolerance);
        Self {
            core: Arc::new(MonitorCore {
                config,
                deps,
                comparator,
                classifier,
                queue: PendingQueue::new(),
                validation: Mutex::new(()),
                running: AtomicBool::new(false),
            }),
            listeners: DashMap::new(),
        }
    }

    pub fn start(&self) {
        if !self.core.running.swap(true, Ordering::SeqCst) {
            info!(
                "Pool monitor started | debounce={}ms | tolerance={:.1}% | throttle={}h",
                self.core.config.debounce_ms,
                self.core.config.value_tolerance * 100.0,
                self.core.config.alert_throttle_hours
            );
        }
    }

    /// Stop all listeners and validate whatever is still queued.
    pub async fn stop(&self) -> BatchReport {
        self.core.running.store(false, Ordering::SeqCst);
        let miners: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        for miner_id in miners {
            self.unsubscribe(&miner_id);
        }
        let report = self.flush().await;
        info!("Pool monitor stopped ({} events flushed)", report.received);
        report
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Start listening to a miner's log stream.
    pub fn subscribe(&self, miner_id: &str, mut stream: LogStream) -> Result<(), MonitorError> {
        if !self.is_running() {
            return Err(MonitorError::NotRunning);
        }

        if let Some(existing) = self.listeners.get(miner_id) {
            if !existing.is_finished() {
                return Err(MonitorError::AlreadySubscribed(miner_id.to_string()));
            }
        }

        let core = Arc::clone(&self.core);
        let miner = miner_id.to_string();
        let handle = tokio::spawn(async move {
            debug!("Listener started for miner {}", miner);
            while let Some(line) = stream.next().await {
                core.ingest(&miner, &line);
            }
            info!("Log stream for miner {} ended", miner);
        });
        self.listeners.insert(miner_id.to_string(), handle);
        info!("Subscribed to miner {}", miner_id);
        Ok(())
    }

    /// Cancel a miner's listener. Already-queued events stay queued.
    pub fn unsubscribe(&self, miner_id: &str) -> bool {
        match self.listeners.remove(miner_id) {
            Some((_, handle)) => {
                handle.abort();
                info!("Unsubscribed from miner {}", miner_id);
                true
            }
            None => false,
        }
    }

    /// Wait for every subscribed stream to end, then forget its listener.
    pub async fn join_listeners(&self) {
        let miners: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        for miner_id in miners {
            if let Some((_, handle)) = self.listeners.remove(&miner_id) {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        warn!("Listener for miner {} failed: {}", miner_id, e);
                    }
                }
            }
        }
    }

    pub fn subscribed_miners(&self) -> Vec<String> {
        let mut miners: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        miners.sort();
        miners
    }

    /// Feed one line directly (same path the listeners use).
    /// Returns true when the line produced a queued event.
    pub fn ingest_line(&self, miner_id: &str, line: &LogLine) -> bool {
        self.core.ingest(miner_id, line)
    }

    pub fn pending_count(&self) -> usize {
        self.core.queue.len()
    }

    /// Drain and validate the queue now, cancelling the pending debounce.
    pub async fn flush(&self) -> BatchReport {
        let batch = self.core.queue.drain();
        self.core.process_batch(batch).await
    }

    /// Validate an explicit set of events
    pub async fn process_batch(&self, events: Vec<PendingEvent>) -> BatchReport {
        self.core.process_batch(events).await
    }

    pub async fn dismiss_alert(&self, id: Uuid, notes: Option<String>) -> Result<bool> {
        let at = self.core.deps.clock.now();
        self.core.deps.alerts.dismiss_alert(id, at, notes).await
    }
}

impl Drop for PoolMonitoringService {
    fn drop(&mut self) {
        for entry in self.listeners.iter() {
            entry.value().abort();
        }
    }
}

impl MonitorCore {
    fn ingest(self: &Arc<Self>, miner_id: &str, line: &LogLine) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        if !is_stratum_component(&line.component, &self.config.stratum_components) {
            return false;
        }
        let Some(notify) = decode_notify_line(&line.text) else {
            return false;
        };

        let outputs = match parse_coinbase(&notify.coinbase1, &notify.coinbase2) {
            Ok(outputs) => outputs,
            Err(e) => {
                debug!("Miner {} job {}: coinbase not parsed: {}", miner_id, notify.job_id, e);
                return false;
            }
        };

        debug!("Miner {} job {}: {} outputs queued", miner_id, notify.job_id, outputs.len());
        self.enqueue(PendingEvent {
            miner_id: miner_id.to_string(),
            outputs,
            raw_text: line.text.clone(),
            received_at: self.deps.clock.now(),
        });
        true
    }

    fn enqueue(self: &Arc<Self>, event: PendingEvent) {
        let generation = self.queue.push(event);
        let core = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(core.config.debounce()).await;
            if let Some(batch) = core.queue.take_if_current(generation) {
                core.process_batch(batch).await;
            }
        });
    }

    async fn process_batch(&self, events: Vec<PendingEvent>) -> BatchReport {
        let mut report = BatchReport {
            received: events.len(),
            ..Default::default()
        };
        if events.is_empty() {
            return report;
        }
        let _round = self.validation.lock().await;

        let mut groups: HashMap<PoolIdentity, Vec<(PendingEvent, MinerPoolContext)>> = HashMap::new();
        for event in events {
            match self.deps.miners.active_pool(&event.miner_id).await {
                Ok(Some(ctx)) => groups.entry(ctx.identity.clone()).or_default().push((event, ctx)),
                Ok(None) => {
                    report.dropped += 1;
                    debug!("Unknown miner {} - dropping event", event.miner_id);
                }
                Err(e) => {
                    report.dropped += 1;
                    warn!("Active pool lookup failed for miner {}: {:#}", event.miner_id, e);
                }
            }
        }
        report.groups = groups.len();

        for (identity, items) in groups {
            let mut group_report = BatchReport::default();
            let result = self.validate_group(&identity, items, &mut group_report).await;
            report.absorb(&group_report);
            if let Err(e) = result {
                report.groups_failed += 1;
                warn!("Validation for pool {} aborted: {:#}", identity, e);
            }
        }

        info!(
            "Batch validated | events={} dropped={} pools={} failed={} matched={} throttled={} unapproved={} alerts={}",
            report.received,
            report.dropped,
            report.groups,
            report.groups_failed,
            report.matched,
            report.throttled,
            report.unapproved,
            report.alerts_raised
        );
        report
    }

    async fn validate_group(
        &self,
        identity: &PoolIdentity,
        items: Vec<(PendingEvent, MinerPoolContext)>,
        report: &mut BatchReport,
    ) -> Result<()> {
        let stored = self
            .deps
            .approvals
            .approval(identity)
            .await
            .context("approval lookup failed")?;

        let approval = match stored {
            Some(approval) => approval,
            None => match self.try_auto_approve(identity, &items).await? {
                Some(approval) => approval,
                None => {
                    report.unapproved += items.len();
                    debug!("Pool {} has no approved baseline - {} events skipped", identity, items.len());
                    return Ok(());
                }
            },
        };

        let now = self.deps.clock.now();
        let mut throttled = self
            .deps
            .alerts
            .miners_alerted_since(identity, now - self.config.throttle_window())
            .await
            .context("alert history lookup failed")?;

        for (event, ctx) in items {
            if throttled.contains(&event.miner_id) {
                report.throttled += 1;
                continue;
            }

            let comparison = self.comparator.compare(&event.outputs, &approval.approved_outputs);
            if comparison.matches {
                report.matched += 1;
                continue;
            }

            let severity = self.classifier.classify(&event.outputs, &approval.approved_outputs);
            let reason = comparison.reason.map(|r| r.to_string()).unwrap_or_default();
            let alert = PoolAlertEvent {
                id: Uuid::new_v4(),
                detected_at: now,
                miner_id: event.miner_id.clone(),
                miner_hostname: ctx.hostname,
                miner_ip: ctx.ip,
                pool_identity: identity.clone(),
                is_using_fallback_pool: ctx.is_using_fallback,
                expected_outputs: approval.approved_outputs.clone(),
                actual_outputs: event.outputs,
                severity,
                reason,
                is_dismissed: false,
                dismissed_at: None,
                notes: None,
                raw_message: event.raw_text,
            };

            self.deps
                .alerts
                .append_alert(alert.clone())
                .await
                .context("alert write failed")?;
            throttled.insert(event.miner_id);
            report.alerts_raised += 1;

            warn!(
                "POOL OUTPUT MISMATCH [{}] miner={} ({}) pool={} fallback={} | {}",
                alert.severity,
                alert.miner_id,
                alert.miner_ip,
                identity,
                alert.is_using_fallback_pool,
                alert.reason
            );

            if let Err(e) = self.deps.sink.publish(&alert).await {
                warn!("Alert {} not published via {}: {:#}", alert.id, self.deps.sink.name(), e);
            }
        }

        Ok(())
    }

    /// Solo-style pools pay the account itself: a single output whose address
    /// equals the stratum user base is accepted as the baseline.
    async fn try_auto_approve(
        &self,
        identity: &PoolIdentity,
        items: &[(PendingEvent, MinerPoolContext)],
    ) -> Result<Option<PoolApproval>> {
        let Some((first, _)) = items.first() else {
            return Ok(None);
        };
        let [only] = first.outputs.as_slice() else {
            return Ok(None);
        };
        if only.address != identity.stratum_user_base {
            return Ok(None);
        }

        let approval = PoolApproval {
            identity: identity.clone(),
            approved_outputs: first.outputs.clone(),
            verified_at: self.deps.clock.now(),
            verified_by_miner_id: first.miner_id.clone(),
            is_auto_approved: true,
        };
        self.deps
            .approvals
            .upsert_approval(approval.clone())
            .await
            .context("auto-approval write failed")?;
        info!("Auto-approved pool {} (single payout to account address)", identity);
        Ok(Some(approval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::BroadcastAlertSink;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::types::{AlertSeverity, BitcoinOutput, MinerRecord, PoolEndpoint, ScriptType};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio_stream::wrappers::ReceiverStream;

    const POOL_A: &str = "stratum+tcp://pool-a.example";
    const POOL_B: &str = "stratum+tcp://pool-b.example";
    const SOLO: &str = "stratum+tcp://solo.example";
    const GENESIS_ADDR: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const GENESIS_SCRIPT: &str = "76a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac";
    const ATTACKER_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";
    const COMMITMENT_SCRIPT: &str =
        "6a24aa21a9ed0000000000000000000000000000000000000000000000000000000000000000";

    /// Approval store that counts reads and can fail for one pool
    struct CountingApprovals {
        inner: MemoryStore,
        reads: AtomicUsize,
        fail_url: Option<String>,
    }

    #[async_trait]
    impl PoolApprovalStore for CountingApprovals {
        async fn approval(&self, identity: &PoolIdentity) -> Result<Option<PoolApproval>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_url.as_deref() == Some(identity.pool_url.as_str()) {
                anyhow::bail!("store offline");
            }
            self.inner.approval(identity).await
        }

        async fn upsert_approval(&self, approval: PoolApproval) -> Result<()> {
            self.inner.upsert_approval(approval).await
        }
    }

    /// Alert store whose history read returns what it saw before a delay
    struct SlowHistory {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl AlertStore for SlowHistory {
        async fn miners_alerted_since(&self, identity: &PoolIdentity, since: DateTime<Utc>) -> Result<HashSet<String>> {
            let seen = self.inner.miners_alerted_since(identity, since).await?;
            tokio::time::sleep(self.delay).await;
            Ok(seen)
        }

        async fn append_alert(&self, alert: PoolAlertEvent) -> Result<()> {
            self.inner.append_alert(alert).await
        }

        async fn dismiss_alert(&self, id: Uuid, at: DateTime<Utc>, notes: Option<String>) -> Result<bool> {
            self.inner.dismiss_alert(id, at, notes).await
        }

        async fn alerts(&self, include_dismissed: bool) -> Result<Vec<PoolAlertEvent>> {
            self.inner.alerts(include_dismissed).await
        }
    }

    struct Harness {
        service: PoolMonitoringService,
        store: MemoryStore,
        approvals: Arc<CountingApprovals>,
        clock: Arc<ManualClock>,
        sink: BroadcastAlertSink,
    }

    impl Harness {
        fn reads(&self) -> usize {
            self.approvals.reads.load(Ordering::SeqCst)
        }

        fn ingest(&self, miner: &str, line: &str) -> bool {
            self.service.ingest_line(miner, &LogLine::new("stratum", line))
        }
    }

    fn miner(id: &str, url: &str, user: &str) -> MinerRecord {
        MinerRecord {
            miner_id: id.to_string(),
            hostname: format!("{}-host", id),
            ip: "10.0.0.10".to_string(),
            primary: PoolEndpoint { url: url.to_string(), port: 3333, user: user.to_string() },
            fallback: Some(PoolEndpoint { url: POOL_B.to_string(), port: 3333, user: "acct.w".to_string() }),
            is_using_fallback: false,
        }
    }

    fn baseline(url: &str, outputs: Vec<BitcoinOutput>) -> PoolApproval {
        PoolApproval {
            identity: PoolIdentity::new(url, 3333, "acct"),
            approved_outputs: outputs,
            verified_at: Utc::now(),
            verified_by_miner_id: "m1".to_string(),
            is_auto_approved: false,
        }
    }

    fn approved_outputs() -> Vec<BitcoinOutput> {
        vec![
            BitcoinOutput::new(GENESIS_ADDR, 625_000_000, 0, ScriptType::P2PKH),
            BitcoinOutput::new("OP_RETURN", 0, 1, ScriptType::OpReturn),
        ]
    }

    async fn harness(fail_url: Option<&str>) -> Harness {
        harness_with(fail_url, None).await
    }

    async fn harness_with(fail_url: Option<&str>, history_delay: Option<Duration>) -> Harness {
        let store = MemoryStore::new();
        for id in ["m1", "m2", "m3"] {
            store.upsert_miner(miner(id, POOL_A, "acct.w"));
        }
        store.upsert_miner(miner("m4", POOL_B, "acct.w"));
        store.upsert_miner(miner("solo1", SOLO, &format!("{}.rig", GENESIS_ADDR)));

        store.upsert_approval(baseline(POOL_A, approved_outputs())).await.unwrap();
        let pool_b_outputs = vec![
            BitcoinOutput::new("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", 625_000_000, 0, ScriptType::P2WPKH),
            BitcoinOutput::new("OP_RETURN", 0, 1, ScriptType::OpReturn),
        ];
        store.upsert_approval(baseline(POOL_B, pool_b_outputs)).await.unwrap();

        let approvals = Arc::new(CountingApprovals {
            inner: store.clone(),
            reads: AtomicUsize::new(0),
            fail_url: fail_url.map(str::to_string),
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sink = BroadcastAlertSink::default();
        let alerts: Arc<dyn AlertStore> = match history_delay {
            Some(delay) => Arc::new(SlowHistory { inner: store.clone(), delay }),
            None => Arc::new(store.clone()),
        };

        let deps = MonitorDeps {
            approvals: approvals.clone(),
            alerts,
            miners: Arc::new(store.clone()),
            sink: Arc::new(sink.clone()),
            clock: clock.clone(),
        };
        let service = PoolMonitoringService::new(MonitorConfig::default(), deps);
        service.start();

        Harness { service, store, approvals, clock, sink }
    }

    fn output_bytes(value: i64, script_hex: &str) -> Vec<u8> {
        let script = hex::decode(script_hex).unwrap();
        let mut out = value.to_le_bytes().to_vec();
        out.push(script.len() as u8);
        out.extend(script);
        out
    }

    /// A miner debug line carrying a mining.notify whose coinbase pays `outputs`
    fn notify_line(outputs: &[(i64, &str)]) -> String {
        let coinbase1 =
            "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff2003a0bb0d";
        let mut tail = hex::decode("2f736c7573682f").unwrap();
        tail.extend([0xff, 0xff, 0xff, 0xff, outputs.len() as u8]);
        for (value, script) in outputs {
            tail.extend(output_bytes(*value, script));
        }
        tail.extend([0u8; 4]);
        format!(
            r#"[2024-05-01 12:00:00] stratum << {{"params":["6f1a","00000000000000000002a7c4","{}","{}",[],"20000000","17034219","663219a0",true],"id":null,"method":"mining.notify"}}"#,
            coinbase1,
            hex::encode(tail)
        )
    }

    fn honest(value: i64) -> String {
        notify_line(&[(value, GENESIS_SCRIPT), (0, COMMITMENT_SCRIPT)])
    }

    fn hijacked() -> String {
        notify_line(&[(625_000_000, ATTACKER_SCRIPT), (0, COMMITMENT_SCRIPT)])
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_reads_approval_once_per_pool() {
        let h = harness(None).await;
        for miner in ["m1", "m2", "m3", "m1", "m2"] {
            assert!(h.ingest(miner, &honest(625_000_000)));
        }
        assert_eq!(h.service.pending_count(), 5);
        assert_eq!(h.reads(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(h.service.pending_count(), 0);
        assert_eq!(h.reads(), 1);
        assert_eq!(h.store.alert_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_restarts_on_each_enqueue() {
        let h = harness(None).await;
        h.ingest("m1", &honest(625_000_000));
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.ingest("m2", &honest(625_000_000));
        tokio::time::sleep(Duration::from_millis(300)).await;

        // first timer fired at 500ms but was superseded
        assert_eq!(h.reads(), 0);
        assert_eq!(h.service.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(h.reads(), 1);
        assert_eq!(h.service.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_drift_matches_and_address_swap_alerts_high() {
        let h = harness(None).await;
        let mut alerts = h.sink.subscribe();

        // -0.8% drift
        h.ingest("m1", &honest(620_000_000));
        let report = h.service.flush().await;
        assert_eq!(report.matched, 1);
        assert_eq!(report.alerts_raised, 0);
        assert_eq!(h.store.alert_count(), 0);

        h.ingest("m1", &hijacked());
        let report = h.service.flush().await;
        assert_eq!(report.alerts_raised, 1);

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.miner_id, "m1");
        assert_eq!(alert.miner_hostname, "m1-host");
        assert_eq!(alert.actual_outputs[0].address, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert_eq!(alert.expected_outputs, approved_outputs());
        assert!(alert.reason.starts_with("address mismatch at output 0"));
        assert!(alert.raw_message.contains("mining.notify"));
        assert!(!alert.is_using_fallback_pool);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alerts_throttled_for_24_hours() {
        let h = harness(None).await;

        h.ingest("m1", &hijacked());
        assert_eq!(h.service.flush().await.alerts_raised, 1);

        h.ingest("m1", &hijacked());
        let report = h.service.flush().await;
        assert_eq!(report.alerts_raised, 0);
        assert_eq!(report.throttled, 1);
        assert_eq!(h.store.alert_count(), 1);

        // other miners on the same pool are not throttled
        h.ingest("m2", &hijacked());
        assert_eq!(h.service.flush().await.alerts_raised, 1);

        h.clock.advance(chrono::Duration::hours(25));
        h.ingest("m1", &hijacked());
        assert_eq!(h.service.flush().await.alerts_raised, 1);
        assert_eq!(h.store.alert_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_rounds_alert_once() {
        let h = harness_with(None, Some(Duration::from_secs(2))).await;

        h.ingest("m1", &hijacked());
        tokio::time::sleep(Duration::from_millis(600)).await;
        // first round is still inside its history read
        assert_eq!(h.store.alert_count(), 0);

        h.ingest("m1", &hijacked());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(h.store.alert_count(), 1);
        assert_eq!(h.service.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_alert_per_miner_within_a_batch() {
        let h = harness(None).await;
        h.ingest("m1", &hijacked());
        h.ingest("m1", &hijacked());
        let report = h.service.flush().await;
        assert_eq!(report.received, 2);
        assert_eq!(report.alerts_raised, 1);
        assert_eq!(report.throttled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_only_aborts_that_pool() {
        let h = harness(Some(POOL_B)).await;
        h.ingest("m1", &hijacked());
        h.ingest("m4", &honest(625_000_000));

        let report = h.service.flush().await;
        assert_eq!(report.groups, 2);
        assert_eq!(report.groups_failed, 1);
        assert_eq!(report.alerts_raised, 1);

        let alerts = h.store.alerts(true).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].pool_identity.pool_url, POOL_A);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_pool_is_validated_against_its_own_baseline() {
        let h = harness(None).await;
        assert!(h.store.set_fallback_flag("m1", true));

        // Pool A's payout is wrong for pool B's baseline
        h.ingest("m1", &honest(625_000_000));
        let report = h.service.flush().await;
        assert_eq!(report.alerts_raised, 1);

        let alerts = h.store.alerts(true).await.unwrap();
        assert_eq!(alerts[0].pool_identity.pool_url, POOL_B);
        assert!(alerts[0].is_using_fallback_pool);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_miner_and_unapproved_pool() {
        let h = harness(None).await;
        h.store.upsert_miner(miner("m9", "stratum+tcp://new-pool.example", "acct.w"));

        h.ingest("ghost", &hijacked());
        h.ingest("m9", &hijacked());
        let report = h.service.flush().await;
        assert_eq!(report.dropped, 1);
        assert_eq!(report.unapproved, 1);
        assert_eq!(report.alerts_raised, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_solo_pool_auto_approval() {
        let h = harness(None).await;
        let solo_payout = notify_line(&[(625_000_000, GENESIS_SCRIPT)]);

        h.ingest("solo1", &solo_payout);
        let report = h.service.flush().await;
        assert_eq!(report.matched, 1);

        let identity = PoolIdentity::new(SOLO, 3333, GENESIS_ADDR);
        let approval = h.store.approval(&identity).await.unwrap().unwrap();
        assert!(approval.is_auto_approved);
        assert_eq!(approval.verified_by_miner_id, "solo1");

        // the single payout redirected is a majority of outputs
        let mut alerts = h.sink.subscribe();
        h.ingest("solo1", &notify_line(&[(625_000_000, ATTACKER_SCRIPT)]));
        let report = h.service.flush().await;
        assert_eq!(report.alerts_raised, 1);
        assert_eq!(alerts.recv().await.unwrap().severity, AlertSeverity::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_filters() {
        let h = harness(None).await;
        assert!(!h.service.ingest_line("m1", &LogLine::new("fan_ctrl", honest(625_000_000))));
        assert!(!h.ingest("m1", "stratum << {\"id\":3,\"result\":true,\"error\":null}"));
        assert!(!h.ingest("m1", "stratum << {\"params\":[\"6f1a\",\"00\",\"zz\""));
        // decodes, but the coinbase has no sequence marker
        let no_marker = r#"{"params":["1","00","0100","0200",[],"20000000","17034219","663219a0",false],"id":null,"method":"mining.notify"}"#;
        assert!(!h.ingest("m1", no_marker));
        assert_eq!(h.service.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_lifecycle() {
        let h = harness(None).await;
        h.service.stop().await;
        assert!(!h.service.is_running());

        let (_tx, rx) = tokio::sync::mpsc::channel::<LogLine>(8);
        assert_eq!(
            h.service.subscribe("m1", Box::pin(ReceiverStream::new(rx))),
            Err(MonitorError::NotRunning)
        );

        h.service.start();
        let (tx, rx) = tokio::sync::mpsc::channel::<LogLine>(8);
        h.service.subscribe("m1", Box::pin(ReceiverStream::new(rx))).unwrap();

        let (_tx2, rx2) = tokio::sync::mpsc::channel::<LogLine>(8);
        assert_eq!(
            h.service.subscribe("m1", Box::pin(ReceiverStream::new(rx2))),
            Err(MonitorError::AlreadySubscribed("m1".to_string()))
        );
        assert_eq!(h.service.subscribed_miners(), vec!["m1".to_string()]);

        tx.send(LogLine::new("Stratum", hijacked())).await.unwrap();
        tx.send(LogLine::new("miner", "temp=71C")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.store.alert_count(), 1);

        assert!(h.service.unsubscribe("m1"));
        assert!(!h.service.unsubscribe("m1"));
        assert!(h.service.subscribed_miners().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_listeners_waits_for_stream_end() {
        let h = harness(None).await;
        let (tx, rx) = tokio::sync::mpsc::channel::<LogLine>(8);
        h.service.subscribe("m2", Box::pin(ReceiverStream::new(rx))).unwrap();

        tx.send(LogLine::new("stratum", hijacked())).await.unwrap();
        drop(tx);
        h.service.join_listeners().await;

        assert!(h.service.subscribed_miners().is_empty());
        assert_eq!(h.service.pending_count(), 1);
        assert_eq!(h.service.stop().await.alerts_raised, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flushes_pending_events_once() {
        let h = harness(None).await;
        h.ingest("m1", &hijacked());
        let report = h.service.stop().await;
        assert_eq!(report.alerts_raised, 1);

        // the superseded debounce timer must not re-run the batch
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.store.alert_count(), 1);
        assert_eq!(h.reads(), 1);

        // ingestion is closed after stop
        assert!(!h.ingest("m1", &hijacked()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_alert() {
        let h = harness(None).await;
        h.ingest("m2", &hijacked());
        h.service.flush().await;

        let id = h.store.alerts(true).await.unwrap()[0].id;
        assert!(h.service.dismiss_alert(id, Some("pool migrated".to_string())).await.unwrap());
        assert!(h.store.alerts(false).await.unwrap().is_empty());

        let dismissed = &h.store.alerts(true).await.unwrap()[0];
        assert!(dismissed.is_dismissed);
        assert_eq!(dismissed.dismissed_at, Some(h.clock.now()));
        assert_eq!(dismissed.notes.as_deref(), Some("pool migrated"));
    }
}
