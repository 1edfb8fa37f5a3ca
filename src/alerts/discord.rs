//! Discord webhook alerts
//!
//! Posts one embed per pool alert, coloured by severity.
//!
//! Usage:
//!   Set `discord_webhook` in the config file or the DISCORD_WEBHOOK
//!   environment variable. With neither set the sink is a no-op.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::AlertSink;
use crate::types::{AlertSeverity, BitcoinOutput, PoolAlertEvent};

/// Discord webhook message structure
#[derive(Serialize)]
struct DiscordMessage {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

/// Discord embed structure for rich formatting
#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<DiscordField>,
    footer: Option<DiscordFooter>,
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

/// Embed field values are capped at 1024 characters by Discord
const FIELD_LIMIT: usize = 1024;

pub struct DiscordAlertSink {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl DiscordAlertSink {
    pub fn new(webhook_url: Option<String>) -> Self {
        if webhook_url.is_some() {
            info!("Discord alerts enabled");
        } else {
            warn!("No Discord webhook configured - Discord alerts disabled");
        }

        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

fn severity_color(severity: AlertSeverity) -> u32 {
    match severity {
        AlertSeverity::Critical => 0xFF0000, // Red
        AlertSeverity::High => 0xFFA500,     // Orange
        AlertSeverity::Medium => 0xFFFF00,   // Yellow
        AlertSeverity::Low => 0x808080,      // Grey
    }
}

fn format_outputs(outputs: &[BitcoinOutput]) -> String {
    if outputs.is_empty() {
        return "none".to_string();
    }
    let mut body = String::from("```\n");
    for o in outputs {
        body.push_str(&format!("#{} {} {:.8} BTC\n", o.output_index, o.address, o.value_btc()));
    }
    body.push_str("```");
    if body.len() > FIELD_LIMIT {
        let mut cut = FIELD_LIMIT - 8;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("\n…\n```");
    }
    body
}

fn build_message(alert: &PoolAlertEvent) -> DiscordMessage {
    let pool_kind = if alert.is_using_fallback_pool { "fallback" } else { "primary" };
    let embed = DiscordEmbed {
        title: format!("Pool payout mismatch ({})", alert.severity),
        description: format!(
            "**Miner:** `{}` ({} / {})\n**Pool:** {} ({})\n**Reason:** {}",
            alert.miner_id,
            alert.miner_hostname,
            alert.miner_ip,
            alert.pool_identity,
            pool_kind,
            alert.reason
        ),
        color: severity_color(alert.severity),
        fields: vec![
            DiscordField {
                name: "Expected outputs".to_string(),
                value: format_outputs(&alert.expected_outputs),
                inline: false,
            },
            DiscordField {
                name: "Actual outputs".to_string(),
                value: format_outputs(&alert.actual_outputs),
                inline: false,
            },
        ],
        footer: Some(DiscordFooter {
            text: format!("Alert {}", alert.id),
        }),
        timestamp: Some(alert.detected_at.to_rfc3339()),
    };

    DiscordMessage {
        content: None,
        embeds: vec![embed],
    }
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn publish(&self, alert: &PoolAlertEvent) -> Result<()> {
        let webhook_url = match &self.webhook_url {
            Some(url) => url,
            None => return Ok(()),
        };

        let response = self
            .client
            .post(webhook_url)
            .json(&build_message(alert))
            .send()
            .await
            .context("Failed to send Discord alert")?;

        if !response.status().is_success() {
            anyhow::bail!("Discord webhook returned status: {}", response.status());
        }
        info!("Discord alert sent for miner {} ({})", alert.miner_id, alert.severity);
        Ok(())
    }

    fn name(&self) -> &str {
        "discord"
    }
}
