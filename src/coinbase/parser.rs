//! Coinbase output extraction
//!
//! Layout after the sequence marker:
//!     count:compactsize { value:i64le  script_len:compactsize  script:[u8] }*
//!
//! Parsing is total: every short read or malformed field becomes a
//! `CoinbaseError`, never a panic, and identical input always yields an
//! identical result.

use std::ops::RangeInclusive;

use super::script::classify_script;
use super::CoinbaseError;
use crate::types::BitcoinOutput;

/// Largest output list accepted from a pool template
pub const MAX_OUTPUT_COUNT: u64 = 20;

/// Output counts that make an FF FF FF FF match a believable sequence field
pub const PLAUSIBLE_OUTPUT_COUNT: RangeInclusive<u8> = 1..=10;

const SEQUENCE_MARKER: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// Parse the payout outputs of a coinbase given as its two stratum halves.
pub fn parse_coinbase(coinbase1_hex: &str, coinbase2_hex: &str) -> Result<Vec<BitcoinOutput>, CoinbaseError> {
    let mut joined = String::with_capacity(coinbase1_hex.len() + coinbase2_hex.len());
    joined.push_str(coinbase1_hex.trim());
    joined.push_str(coinbase2_hex.trim());

    let bytes = hex::decode(&joined).map_err(|e| CoinbaseError::InvalidHex(e.to_string()))?;
    parse_coinbase_bytes(&bytes)
}

/// Parse the payout outputs from raw coinbase bytes.
pub fn parse_coinbase_bytes(bytes: &[u8]) -> Result<Vec<BitcoinOutput>, CoinbaseError> {
    let start = find_output_list(bytes).ok_or(CoinbaseError::SequenceMarkerNotFound)?;
    read_outputs(&mut Reader::new(bytes, start))
}

/// Offset of the output count: first FF FF FF FF immediately followed by a
/// byte in the plausible-count window.
fn find_output_list(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(SEQUENCE_MARKER.len() + 1)
        .position(|w| w[..4] == SEQUENCE_MARKER && PLAUSIBLE_OUTPUT_COUNT.contains(&w[4]))
        .map(|i| i + SEQUENCE_MARKER.len())
}

fn read_outputs(reader: &mut Reader<'_>) -> Result<Vec<BitcoinOutput>, CoinbaseError> {
    let count = reader.read_compact_size()?;
    if !(1..=MAX_OUTPUT_COUNT).contains(&count) {
        return Err(CoinbaseError::InvalidOutputCount(count));
    }

    let mut outputs = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let value = reader.read_i64_le()?;
        if value < 0 {
            return Err(CoinbaseError::NegativeOutputValue { index, value });
        }

        let script_offset = reader.pos;
        let script_len = usize::try_from(reader.read_compact_size()?)
            .map_err(|_| CoinbaseError::InvalidVarInt { offset: script_offset })?;
        let script = reader.take(script_len)?;

        let (script_type, address) = classify_script(script)?;
        outputs.push(BitcoinOutput {
            address,
            value_satoshis: value,
            output_index: index,
            script_type,
        });
    }

    Ok(outputs)
}

/// Bounds-checked little-endian cursor
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CoinbaseError> {
        let remaining = self.data.len().saturating_sub(self.pos);
        if remaining < n {
            return Err(CoinbaseError::UnexpectedEndOfData { offset: self.pos, needed: n });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CoinbaseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_i64_le(&mut self) -> Result<i64, CoinbaseError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Bitcoin compactsize. A wide prefix carrying a small value is read
    /// as-is; only the width of the prefix matters.
    fn read_compact_size(&mut self) -> Result<u64, CoinbaseError> {
        let [prefix] = self.read_array::<1>()?;
        Ok(match prefix {
            0x00..=0xfc => u64::from(prefix),
            0xfd => u64::from(u16::from_le_bytes(self.read_array()?)),
            0xfe => u64::from(u32::from_le_bytes(self.read_array()?)),
            0xff => u64::from_le_bytes(self.read_array()?),
        })
    }
}
