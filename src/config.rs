//! Configuration management
//!
//! Monitor settings from a TOML file, with `.env` / environment overrides
//! for secrets. Every field is optional; omitted fields take the contract
//! defaults (500 ms debounce, 5% value tolerance, 24 h alert throttle).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Quiet period after the last enqueue before a batch is validated
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Allowed relative drift of an output value
    #[serde(default = "default_value_tolerance")]
    pub value_tolerance: f64,
    /// One alert per (miner, pool) within this window
    #[serde(default = "default_alert_throttle_hours")]
    pub alert_throttle_hours: i64,
    /// Log components treated as stratum traffic (case-insensitive substring)
    #[serde(default = "default_stratum_components")]
    pub stratum_components: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON objects instead of text
    #[serde(default)]
    pub log_json: bool,
    /// JSON snapshot of approvals, alerts and miners
    #[serde(default)]
    pub state_file: Option<String>,
    #[serde(default)]
    pub discord_webhook: Option<String>,
}

fn default_debounce_ms() -> u64 { 500 }
fn default_value_tolerance() -> f64 { 0.05 }
fn default_alert_throttle_hours() -> i64 { 24 }
fn default_stratum_components() -> Vec<String> { vec!["stratum".to_string()] }
fn default_log_level() -> String { "info".to_string() }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            value_tolerance: default_value_tolerance(),
            alert_throttle_hours: default_alert_throttle_hours(),
            stratum_components: default_stratum_components(),
            log_level: default_log_level(),
            log_json: false,
            state_file: None,
            discord_webhook: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Reject settings that would disable batching or make every value drift pass
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            anyhow::bail!("debounce_ms must be greater than zero");
        }
        if !(0.0..1.0).contains(&self.value_tolerance) {
            anyhow::bail!("value_tolerance must be in [0, 1), got {}", self.value_tolerance);
        }
        if self.alert_throttle_hours < 0 {
            anyhow::bail!("alert_throttle_hours must not be negative");
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.alert_throttle_hours)
    }
}

/// Load config from an optional TOML path, then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    dotenv::dotenv().ok();

    let mut config = match path {
        Some(p) => MonitorConfig::load(p)?,
        None => MonitorConfig::default(),
    };

    if let Ok(webhook) = std::env::var("DISCORD_WEBHOOK") {
        if !webhook.trim().is_empty() {
            config.discord_webhook = Some(webhook);
        }
    }
    if let Ok(state_file) = std::env::var("POOL_SENTINEL_STATE") {
        config.state_file = Some(state_file);
    }

    config.validate()?;
    Ok(config)
}
