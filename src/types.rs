//! Core data structures
//!
//! Payout outputs, pool identities, approvals, alerts and the miner records
//! the monitor resolves active pools from. Everything here is plain data;
//! behaviour lives in the codec/coinbase/stratum/verify/monitor modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Output script classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    P2PKH,
    P2SH,
    P2WPKH,
    P2WSH,
    OpReturn,
    Unknown,
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScriptType::P2PKH => write!(f, "P2PKH"),
            ScriptType::P2SH => write!(f, "P2SH"),
            ScriptType::P2WPKH => write!(f, "P2WPKH"),
            ScriptType::P2WSH => write!(f, "P2WSH"),
            ScriptType::OpReturn => write!(f, "OP_RETURN"),
            ScriptType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One decoded coinbase payout output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinOutput {
    /// Rendered address, or the literal "OP_RETURN" label
    pub address: String,
    pub value_satoshis: i64,
    /// Position in the transaction's output list (0-based)
    pub output_index: usize,
    pub script_type: ScriptType,
}

impl BitcoinOutput {
    pub fn new(address: impl Into<String>, value_satoshis: i64, output_index: usize, script_type: ScriptType) -> Self {
        Self {
            address: address.into(),
            value_satoshis,
            output_index,
            script_type,
        }
    }

    /// Value in BTC, for display only
    pub fn value_btc(&self) -> f64 {
        self.value_satoshis as f64 / 100_000_000.0
    }
}

/// Key of an approval baseline: pool endpoint plus the account part of the
/// stratum username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolIdentity {
    pub pool_url: String,
    pub pool_port: u16,
    pub stratum_user_base: String,
}

impl PoolIdentity {
    pub fn new(pool_url: impl Into<String>, pool_port: u16, stratum_user_base: impl Into<String>) -> Self {
        Self {
            pool_url: pool_url.into(),
            pool_port,
            stratum_user_base: stratum_user_base.into(),
        }
    }

    /// Build from a full stratum username ("account.worker" → "account")
    pub fn from_stratum_user(pool_url: &str, pool_port: u16, stratum_user: &str) -> Self {
        Self::new(pool_url, pool_port, user_base(stratum_user))
    }
}

impl fmt::Display for PoolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.pool_url, self.pool_port, self.stratum_user_base)
    }
}

/// Substring of a stratum username before the first '.'
pub fn user_base(stratum_user: &str) -> &str {
    stratum_user.split('.').next().unwrap_or(stratum_user)
}

/// A configured pool endpoint on a miner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEndpoint {
    pub url: String,
    pub port: u16,
    pub user: String,
}

impl PoolEndpoint {
    pub fn identity(&self) -> PoolIdentity {
        PoolIdentity::from_stratum_user(&self.url, self.port, &self.user)
    }
}

/// Miner as known to the external device registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerRecord {
    pub miner_id: String,
    pub hostname: String,
    pub ip: String,
    pub primary: PoolEndpoint,
    #[serde(default)]
    pub fallback: Option<PoolEndpoint>,
    /// Last known fallback flag reported by the miner
    #[serde(default)]
    pub is_using_fallback: bool,
}

impl MinerRecord {
    /// Resolve the currently active pool. A set fallback flag with no
    /// fallback configured resolves to the primary.
    pub fn active_pool(&self) -> MinerPoolContext {
        let (endpoint, using_fallback) = match (&self.fallback, self.is_using_fallback) {
            (Some(fallback), true) => (fallback, true),
            _ => (&self.primary, false),
        };
        MinerPoolContext {
            hostname: self.hostname.clone(),
            ip: self.ip.clone(),
            identity: endpoint.identity(),
            is_using_fallback: using_fallback,
        }
    }
}

/// Active-pool resolution for one miner at validation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerPoolContext {
    pub hostname: String,
    pub ip: String,
    pub identity: PoolIdentity,
    pub is_using_fallback: bool,
}

/// Approved output baseline for one pool identity (singleton per identity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolApproval {
    pub identity: PoolIdentity,
    pub approved_outputs: Vec<BitcoinOutput>,
    pub verified_at: DateTime<Utc>,
    pub verified_by_miner_id: String,
    #[serde(default)]
    pub is_auto_approved: bool,
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Raised when a miner's live coinbase outputs diverge from the approved baseline.
/// Append-only; only the dismissal fields change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolAlertEvent {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub miner_id: String,
    pub miner_hostname: String,
    pub miner_ip: String,
    pub pool_identity: PoolIdentity,
    pub is_using_fallback_pool: bool,
    pub expected_outputs: Vec<BitcoinOutput>,
    pub actual_outputs: Vec<BitcoinOutput>,
    pub severity: AlertSeverity,
    /// Human-readable first violation from the comparator
    pub reason: String,
    #[serde(default)]
    pub is_dismissed: bool,
    #[serde(default)]
    pub dismissed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub raw_message: String,
}

/// One captured log/debug frame from a miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Firmware component that emitted the line (e.g. "stratum", "cgminer")
    pub component: String,
    pub text: String,
}

impl LogLine {
    pub fn new(component: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            text: text.into(),
        }
    }
}
