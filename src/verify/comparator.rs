//! Output Comparator
//!
//! Rules, applied in order:
//!     1. Output counts must be equal.
//!     2. Per index: address must match exactly (checked before value).
//!     3. Per index: |actual - approved| <= tolerance × approved.
//! The first violation in index order is reported.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value_within_tolerance;
use crate::types::BitcoinOutput;

/// Allowed relative value drift per output (5%)
pub const DEFAULT_VALUE_TOLERANCE: f64 = 0.05;

/// First violation found by the comparator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchReason {
    CountMismatch { expected: usize, actual: usize },
    AddressMismatch { index: usize, expected: String, actual: String },
    ValueMismatch { index: usize, expected: i64, actual: i64 },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MismatchReason::CountMismatch { expected, actual } => {
                write!(f, "output count mismatch: expected {}, got {}", expected, actual)
            }
            MismatchReason::AddressMismatch { index, expected, actual } => {
                write!(f, "address mismatch at output {}: expected {}, got {}", index, expected, actual)
            }
            MismatchReason::ValueMismatch { index, expected, actual } => {
                write!(f, "value mismatch at output {}: expected {} sats, got {} sats", index, expected, actual)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub matches: bool,
    pub reason: Option<MismatchReason>,
}

impl ComparisonResult {
    fn matched() -> Self {
        Self { matches: true, reason: None }
    }

    fn mismatch(reason: MismatchReason) -> Self {
        Self { matches: false, reason: Some(reason) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutputComparator {
    tolerance: f64,
}

impl Default for OutputComparator {
    fn default() -> Self {
        Self::new(DEFAULT_VALUE_TOLERANCE)
    }
}

impl OutputComparator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn compare(&self, actual: &[BitcoinOutput], approved: &[BitcoinOutput]) -> ComparisonResult {
        if actual.len() != approved.len() {
            return ComparisonResult::mismatch(MismatchReason::CountMismatch {
                expected: approved.len(),
                actual: actual.len(),
            });
        }

        for (index, (a, e)) in actual.iter().zip(approved).enumerate() {
            if a.address != e.address {
                return ComparisonResult::mismatch(MismatchReason::AddressMismatch {
                    index,
                    expected: e.address.clone(),
                    actual: a.address.clone(),
                });
            }
            if !value_within_tolerance(a.value_satoshis, e.value_satoshis, self.tolerance) {
                return ComparisonResult::mismatch(MismatchReason::ValueMismatch {
                    index,
                    expected: e.value_satoshis,
                    actual: a.value_satoshis,
                });
            }
        }

        ComparisonResult::matched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScriptType;

    const GENESIS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const ATTACKER: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn out(address: &str, sats: i64, idx: usize) -> BitcoinOutput {
        BitcoinOutput::new(address, sats, idx, ScriptType::P2PKH)
    }

    #[test]
    fn test_identical_outputs_match() {
        let approved = vec![out(GENESIS, 625_000_000, 0)];
        let result = OutputComparator::default().compare(&approved.clone(), &approved);
        assert!(result.matches);
        assert_eq!(result.reason, None);
    }

    #[test]
    fn test_small_drift_matches() {
        let approved = vec![out(GENESIS, 625_000_000, 0)];
        let actual = vec![out(GENESIS, 620_000_000, 0)];
        assert!(OutputComparator::default().compare(&actual, &approved).matches);
    }

    #[test]
    fn test_ten_percent_drift_is_value_mismatch() {
        let approved = vec![out(GENESIS, 100_000_000, 0)];
        let actual = vec![out(GENESIS, 110_000_000, 0)];
        let result = OutputComparator::default().compare(&actual, &approved);
        assert!(!result.matches);
        assert_eq!(
            result.reason,
            Some(MismatchReason::ValueMismatch { index: 0, expected: 100_000_000, actual: 110_000_000 })
        );
    }

    #[test]
    fn test_exact_tolerance_boundary_matches() {
        let approved = vec![out(GENESIS, 100_000_000, 0)];
        let actual = vec![out(GENESIS, 105_000_000, 0)];
        assert!(OutputComparator::default().compare(&actual, &approved).matches);
        let actual = vec![out(GENESIS, 105_000_001, 0)];
        assert!(!OutputComparator::default().compare(&actual, &approved).matches);
    }

    #[test]
    fn test_address_reported_before_value() {
        let approved = vec![out(GENESIS, 100, 0), out(GENESIS, 100, 1)];
        // index 0 has value drift, index 1 has address swap → value at 0 wins (index order)
        let actual = vec![out(GENESIS, 500, 0), out(ATTACKER, 100, 1)];
        let result = OutputComparator::default().compare(&actual, &approved);
        assert!(matches!(result.reason, Some(MismatchReason::ValueMismatch { index: 0, .. })));

        // same index: address wins regardless of value
        let actual = vec![out(ATTACKER, 500, 0), out(GENESIS, 100, 1)];
        let result = OutputComparator::default().compare(&actual, &approved);
        assert!(matches!(result.reason, Some(MismatchReason::AddressMismatch { index: 0, .. })));
    }

    #[test]
    fn test_count_mismatch() {
        let approved = vec![out(GENESIS, 100, 0)];
        let actual = vec![out(GENESIS, 100, 0), out(ATTACKER, 1, 1)];
        let result = OutputComparator::default().compare(&actual, &approved);
        assert_eq!(result.reason, Some(MismatchReason::CountMismatch { expected: 1, actual: 2 }));
        assert_eq!(
            result.reason.unwrap().to_string(),
            "output count mismatch: expected 1, got 2"
        );
    }
}
