//! Stratum Message Decoder
//!
//! Purpose:
//!     Turn captured miner log lines into typed `mining.notify` work records.
//!
//! Architecture:
//!     types.rs   — StratumValue (tagged union), StratumMessage, MiningNotifyParams
//!     decoder.rs — component filter, JSON payload location, message decode
//!
//! Notes:
//!     Garbled or partial log lines are routine; every decode path returns
//!     Option and logs at debug/trace rather than raising.

pub mod decoder;
pub mod types;

pub use decoder::{decode_message, decode_notify_line, extract_json_payload, is_stratum_component};
pub use types::{MiningNotifyParams, StratumMessage, StratumValue, MINING_NOTIFY};
