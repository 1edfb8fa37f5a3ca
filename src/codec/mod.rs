//! Address Codec
//!
//! Renders payout script hashes as human-readable Bitcoin addresses.
//!
//! Architecture:
//!     base58.rs — Base58Check (P2PKH / P2SH legacy addresses)
//!     bech32.rs — Bech32 segwit v0 (P2WPKH / P2WSH native addresses)
//!
//! Both encoders are deterministic and allocation-only; neither touches
//! shared state.

pub mod base58;
pub mod bech32;

pub use base58::base58check_encode;
pub use bech32::{bech32_encode, convert_bits};

use thiserror::Error;

/// Mainnet version byte for P2PKH addresses
pub const P2PKH_VERSION: u8 = 0x00;
/// Mainnet version byte for P2SH addresses
pub const P2SH_VERSION: u8 = 0x05;
/// Mainnet segwit human-readable part
pub const MAINNET_HRP: &str = "bc";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("non-zero padding bits in strict bit regrouping")]
    InvalidPadding,
    #[error("invalid human-readable part: {0:?}")]
    InvalidHrp(String),
    #[error("value {value} does not fit in {bits} bits")]
    InvalidDataValue { value: u8, bits: u32 },
}
