//! Pool Sentinel
//!
//! Main entry point for the pool payout monitor.
//! Replays miner log lines through the monitoring service and prints every
//! raised alert as a JSON line on stdout. Logs go to stderr.
//!
//! Input format (one line per log record):
//!   <miner_id>\t<component>\t<text>
//!
//! Usage:
//!   pool-sentinel --config sentinel.toml --input miners.log
//!   tail -F miners.log | pool-sentinel --input -
//!   pool-sentinel alerts --all
//!   pool-sentinel dismiss <alert-id> --notes "pool migration"

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pool_sentinel::alerts::{forward_alerts, AlertSink, BroadcastAlertSink, DiscordAlertSink, MultiSink};
use pool_sentinel::clock::SystemClock;
use pool_sentinel::config::{load_config, MonitorConfig};
use pool_sentinel::monitor::{MonitorDeps, PoolMonitoringService};
use pool_sentinel::store::{AlertStore, MemoryStore, Snapshot};
use pool_sentinel::types::LogLine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Per-miner channel depth before the reader applies backpressure
const MINER_CHANNEL_CAPACITY: usize = 1024;

/// Stratum pool payout monitor
#[derive(Parser)]
#[command(name = "pool-sentinel")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "POOL_SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Log input file, or "-" for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List persisted alerts, newest first
    Alerts {
        /// Include dismissed alerts
        #[arg(long)]
        all: bool,
    },
    /// Mark an alert as reviewed
    Dismiss {
        id: Uuid,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    // Initialize logging (RUST_LOG wins over the config level)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    if config.log_json {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
    }

    let snapshot = match &config.state_file {
        Some(path) => Snapshot::load_or_default(path)?,
        None => Snapshot::default(),
    };
    let store = MemoryStore::from_snapshot(snapshot);

    match args.command {
        Some(Command::Alerts { all }) => list_alerts(&store, all).await,
        Some(Command::Dismiss { id, notes }) => dismiss(&config, &store, id, notes).await,
        None => run(&config, store, &args.input).await,
    }
}

async fn list_alerts(store: &MemoryStore, include_dismissed: bool) -> Result<()> {
    for alert in store.alerts(include_dismissed).await? {
        println!("{}", serde_json::to_string(&alert)?);
    }
    Ok(())
}

async fn dismiss(config: &MonitorConfig, store: &MemoryStore, id: Uuid, notes: Option<String>) -> Result<()> {
    if !store.dismiss_alert(id, chrono::Utc::now(), notes).await? {
        anyhow::bail!("No alert with id {}", id);
    }
    info!("Alert {} dismissed", id);
    save_state(config, store)
}

async fn run(config: &MonitorConfig, store: MemoryStore, input: &str) -> Result<()> {
    info!("===========================================");
    info!("   Pool Sentinel - payout verification");
    info!("===========================================");
    info!(
        "State: {} approvals, {} alerts loaded",
        store.approval_count(),
        store.alert_count()
    );

    let broadcast = BroadcastAlertSink::default();
    let sink = MultiSink::new()
        .with(Arc::new(broadcast.clone()))
        .with(Arc::new(DiscordAlertSink::new(config.discord_webhook.clone())));

    // Alert printer
    let printer = tokio::spawn(forward_alerts(broadcast.subscribe(), |alert| {
        match serde_json::to_string(&alert) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Alert {} not serialisable: {}", alert.id, e),
        }
    }));

    let deps = MonitorDeps {
        approvals: Arc::new(store.clone()),
        alerts: Arc::new(store.clone()),
        miners: Arc::new(store.clone()),
        sink: Arc::new(sink) as Arc<dyn AlertSink>,
        clock: Arc::new(SystemClock),
    };
    let service = PoolMonitoringService::new(config.clone(), deps);
    service.start();

    let lines = if input == "-" {
        info!("Reading miner logs from stdin");
        pump_lines(&service, BufReader::new(tokio::io::stdin())).await?
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("Failed to open input: {}", input))?;
        info!("Reading miner logs from {}", input);
        pump_lines(&service, BufReader::new(file)).await?
    };

    // let listeners drain their channels before the final flush
    service.join_listeners().await;
    let report = service.stop().await;
    info!("Input finished: {} lines read, final batch {:?}", lines, report);

    drop(service);
    drop(broadcast);
    match printer.await {
        Ok(0) => {}
        Ok(skipped) => warn!("{} alerts were not printed (stdout fell behind)", skipped),
        Err(e) => warn!("Alert printer task failed: {}", e),
    }

    save_state(config, &store)
}

/// Fan input lines into one channel per miner. Returns the number of lines read.
async fn pump_lines<R>(service: &PoolMonitoringService, reader: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut channels: HashMap<String, mpsc::Sender<LogLine>> = HashMap::new();
    let mut lines = reader.lines();
    let mut count = 0usize;

    while let Some(raw) = lines.next_line().await.context("Failed to read input")? {
        count += 1;
        let mut parts = raw.splitn(3, '\t');
        let (Some(miner_id), Some(component), Some(text)) = (parts.next(), parts.next(), parts.next()) else {
            warn!("Skipping malformed input line {}", count);
            continue;
        };

        if !channels.contains_key(miner_id) {
            let (tx, rx) = mpsc::channel(MINER_CHANNEL_CAPACITY);
            service.subscribe(miner_id, Box::pin(ReceiverStream::new(rx)))?;
            channels.insert(miner_id.to_string(), tx);
        }
        if let Some(tx) = channels.get(miner_id) {
            if tx.send(LogLine::new(component, text)).await.is_err() {
                warn!("Listener for miner {} is gone", miner_id);
            }
        }
    }

    // closing the senders ends each listener's stream
    drop(channels);
    Ok(count)
}

fn save_state(config: &MonitorConfig, store: &MemoryStore) -> Result<()> {
    if let Some(path) = &config.state_file {
        store.snapshot().write_to_file(path)?;
        info!("State saved to {}", path);
    }
    Ok(())
}
