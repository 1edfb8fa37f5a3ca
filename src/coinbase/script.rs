//! Output script classification
//!
//! | Pattern                     | Len | Type     |
//! |-----------------------------|-----|----------|
//! | 76 A9 14 <20B> 88 AC        | 25  | P2PKH    |
//! | A9 14 <20B> 87              | 23  | P2SH     |
//! | 00 14 <20B>                 | 22  | P2WPKH   |
//! | 00 20 <32B>                 | 34  | P2WSH    |
//! | 6A ...                      | any | OP_RETURN|

use super::CoinbaseError;
use crate::codec::{base58check_encode, bech32_encode, MAINNET_HRP, P2PKH_VERSION, P2SH_VERSION};
use crate::types::ScriptType;

const OP_0: u8 = 0x00;
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_RETURN: u8 = 0x6a;
const PUSH_20: u8 = 0x14;
const PUSH_32: u8 = 0x20;

/// Label used in place of an address for OP_RETURN outputs
pub const OP_RETURN_LABEL: &str = "OP_RETURN";

/// Classify an output script and render its address.
pub fn classify_script(script: &[u8]) -> Result<(ScriptType, String), CoinbaseError> {
    match script {
        [OP_DUP, OP_HASH160, PUSH_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            Ok((ScriptType::P2PKH, base58check_encode(hash, P2PKH_VERSION)))
        }
        [OP_HASH160, PUSH_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            Ok((ScriptType::P2SH, base58check_encode(hash, P2SH_VERSION)))
        }
        [OP_0, PUSH_20, program @ ..] if program.len() == 20 => segwit_v0(ScriptType::P2WPKH, program, script),
        [OP_0, PUSH_32, program @ ..] if program.len() == 32 => segwit_v0(ScriptType::P2WSH, program, script),
        [OP_RETURN, ..] => Ok((ScriptType::OpReturn, OP_RETURN_LABEL.to_string())),
        _ => Err(CoinbaseError::UnsupportedScriptType(hex::encode(script))),
    }
}

fn segwit_v0(kind: ScriptType, program: &[u8], script: &[u8]) -> Result<(ScriptType, String), CoinbaseError> {
    bech32_encode(MAINNET_HRP, 0, program)
        .map(|addr| (kind, addr))
        .map_err(|_| CoinbaseError::UnsupportedScriptType(hex::encode(script)))
}
