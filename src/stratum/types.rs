//! Stratum wire types

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Method name of the work-push notification
pub const MINING_NOTIFY: &str = "mining.notify";

/// Minimum positional parameter count of `mining.notify`
const NOTIFY_PARAM_COUNT: usize = 9;

/// One positional parameter of a stratum message.
///
/// Variant order is the decode order: `Bool` must be tried before `Int`,
/// since a numeric-coercing decoder would otherwise read `true`/`false`
/// as `1`/`0` and misalign the `clean_jobs` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StratumValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<String>),
    Null,
}

impl StratumValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StratumValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StratumValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            StratumValue::Array(items) => Some(items),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StratumValue::Bool(_) => "bool",
            StratumValue::Int(_) => "int",
            StratumValue::Double(_) => "double",
            StratumValue::String(_) => "string",
            StratumValue::Array(_) => "array",
            StratumValue::Null => "null",
        }
    }
}

/// JSON-RPC-like stratum envelope (request, notification or response)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StratumMessage {
    /// Non-integer ids (some pools send strings) decode as None
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Vec<StratumValue>>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.as_i64()))
}

impl StratumMessage {
    pub fn is_notify(&self) -> bool {
        self.method.as_deref() == Some(MINING_NOTIFY)
    }
}

/// Work template pushed by `mining.notify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningNotifyParams {
    pub job_id: String,
    pub prev_hash: String,
    pub coinbase1: String,
    pub coinbase2: String,
    pub merkle_branches: Vec<String>,
    pub version: String,
    pub nbits: String,
    pub ntime: String,
    pub clean_jobs: bool,
}

impl MiningNotifyParams {
    /// Positional extraction. Any type mismatch yields None, never a
    /// partially filled record.
    pub fn from_message(message: &StratumMessage) -> Option<Self> {
        if !message.is_notify() {
            return None;
        }
        let params = message.params.as_deref()?;
        if params.len() < NOTIFY_PARAM_COUNT {
            debug!("mining.notify with {} params (need {})", params.len(), NOTIFY_PARAM_COUNT);
            return None;
        }

        let string_at = |i: usize| -> Option<String> {
            let value = &params[i];
            let s = value.as_str();
            if s.is_none() {
                debug!("mining.notify param {} is {}, expected string", i, value.kind());
            }
            s.map(str::to_string)
        };

        let merkle_branches = match params[4].as_string_array() {
            Some(branches) => branches.to_vec(),
            None => {
                debug!("mining.notify param 4 is {}, expected array", params[4].kind());
                return None;
            }
        };
        let clean_jobs = match params[8].as_bool() {
            Some(flag) => flag,
            None => {
                debug!("mining.notify param 8 is {}, expected bool", params[8].kind());
                return None;
            }
        };

        Some(Self {
            job_id: string_at(0)?,
            prev_hash: string_at(1)?,
            coinbase1: string_at(2)?,
            coinbase2: string_at(3)?,
            merkle_branches,
            version: string_at(5)?,
            nbits: string_at(6)?,
            ntime: string_at(7)?,
            clean_jobs,
        })
    }
}
