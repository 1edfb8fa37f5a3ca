//! Bech32 encoder (BIP173, segwit v0)
//!
//! The witness program is regrouped from 8-bit to 5-bit values, the
//! witness version is prepended as the first 5-bit group, and a 6-digit
//! BCH checksum over (expanded hrp ++ data) is appended.

use super::CodecError;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
const CHECKSUM_LEN: usize = 6;

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(v);
        for (i, g) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

fn create_checksum(hrp: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let pm = polymod(&values) ^ 1;

    let mut out = [0u8; CHECKSUM_LEN];
    for (i, digit) in out.iter_mut().enumerate() {
        *digit = ((pm >> (5 * (5 - i))) & 0x1f) as u8;
    }
    out
}

/// Regroup `data` from `from`-bit to `to`-bit values.
/// With `pad`, leftover bits are zero-padded into a final group; without it,
/// non-zero leftover bits are rejected.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, CodecError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let v = u32::from(value);
        if v >> from != 0 {
            return Err(CodecError::InvalidDataValue { value, bits: from });
        }
        acc = (acc << from) | v;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return Err(CodecError::InvalidPadding);
    }

    Ok(out)
}

/// Encode a witness program as a Bech32 address: `hrp + "1" + data + checksum`.
pub fn bech32_encode(hrp: &str, version: u8, program: &[u8]) -> Result<String, CodecError> {
    if hrp.is_empty() || !hrp.bytes().all(|b| (33..=126).contains(&b) && !b.is_ascii_uppercase()) {
        return Err(CodecError::InvalidHrp(hrp.to_string()));
    }
    if version > 16 {
        return Err(CodecError::InvalidDataValue { value: version, bits: 5 });
    }

    let mut data = Vec::with_capacity(1 + program.len() * 8 / 5 + 1);
    data.push(version);
    data.extend(convert_bits(program, 8, 5, true)?);

    let checksum = create_checksum(hrp, &data);

    let mut encoded = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LEN);
    encoded.push_str(hrp);
    encoded.push('1');
    encoded.extend(
        data.iter()
            .chain(checksum.iter())
            .map(|&d| CHARSET[d as usize] as char),
    );
    Ok(encoded)
}
