//! Coinbase Transaction Parser
//!
//! Purpose:
//!     Recover the payout outputs (address + amount) of the coinbase template
//!     a pool pushes in `mining.notify` (coinbase1 ++ coinbase2).
//!
//! Architecture:
//!     parser.rs — sequence-marker heuristic, compactsize reader, output loop
//!     script.rs — output script pattern → ScriptType + rendered address
//!
//! Notes:
//!     The extranonce placeholder length is unknown at this layer, so the
//!     input's sequence field (FF FF FF FF) followed by a plausible output
//!     count (1..=10) marks the start of the output list. A scriptSig that
//!     itself contains FF FF FF FF + [1..=10] before the real sequence field
//!     will misparse; this is a known limitation and is not guarded against.

pub mod parser;
pub mod script;

pub use parser::{parse_coinbase, parse_coinbase_bytes, MAX_OUTPUT_COUNT, PLAUSIBLE_OUTPUT_COUNT};
pub use script::classify_script;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoinbaseError {
    #[error("coinbase halves are not valid hex: {0}")]
    InvalidHex(String),
    #[error("no sequence marker followed by a plausible output count")]
    SequenceMarkerNotFound,
    #[error("output count {0} outside 1..=20")]
    InvalidOutputCount(u64),
    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEndOfData { offset: usize, needed: usize },
    #[error("malformed compactsize at offset {offset}")]
    InvalidVarInt { offset: usize },
    #[error("output {index} has negative value {value}")]
    NegativeOutputValue { index: usize, value: i64 },
    #[error("unsupported output script: {0}")]
    UnsupportedScriptType(String),
}
