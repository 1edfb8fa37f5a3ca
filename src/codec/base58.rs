//! Base58Check encoder
//!
//! versioned = [version] ++ payload
//! checksum  = SHA256(SHA256(versioned))[..4]
//! digits    = repeated divmod-by-58 of big-endian(versioned ++ checksum)
//!
//! Every leading zero byte of `versioned` is rendered as one leading '1'.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use sha2::{Digest, Sha256};

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Double SHA-256 checksum (first 4 bytes)
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// Encode `payload` under `version` as a Base58Check string.
pub fn base58check_encode(payload: &[u8], version: u8) -> String {
    let mut versioned = Vec::with_capacity(payload.len() + 5);
    versioned.push(version);
    versioned.extend_from_slice(payload);

    let leading_zeros = versioned.iter().take_while(|b| **b == 0).count();

    let mut full = versioned;
    let sum = checksum(&full);
    full.extend_from_slice(&sum);

    let radix = BigUint::from(58u32);
    let mut value = BigUint::from_bytes_be(&full);
    let mut digits: Vec<u8> = Vec::with_capacity(full.len() * 138 / 100 + 1);
    while !value.is_zero() {
        let digit = (&value % &radix).to_usize().unwrap_or(0);
        value /= &radix;
        digits.push(ALPHABET[digit]);
    }

    let mut encoded = String::with_capacity(leading_zeros + digits.len());
    encoded.extend(std::iter::repeat('1').take(leading_zeros));
    encoded.extend(digits.iter().rev().map(|&b| b as char));
    encoded
}
