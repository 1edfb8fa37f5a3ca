//! Severity Classifier
//!
//! ```text
//! critical — output counts differ, or more than half the outputs
//!            pay a different address
//! high     — at least one address differs
//! medium   — more than one value-only mismatch
//! low      — anything else (a single value drift)
//! ```

use super::comparator::DEFAULT_VALUE_TOLERANCE;
use super::value_within_tolerance;
use crate::types::{AlertSeverity, BitcoinOutput};

#[derive(Debug, Clone, Copy)]
pub struct SeverityClassifier {
    tolerance: f64,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_VALUE_TOLERANCE)
    }
}

impl SeverityClassifier {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn classify(&self, actual: &[BitcoinOutput], approved: &[BitcoinOutput]) -> AlertSeverity {
        if actual.len() != approved.len() {
            return AlertSeverity::Critical;
        }

        let mut address_mismatches = 0usize;
        let mut value_mismatches = 0usize;
        for (a, e) in actual.iter().zip(approved) {
            if a.address != e.address {
                address_mismatches += 1;
            } else if !value_within_tolerance(a.value_satoshis, e.value_satoshis, self.tolerance) {
                value_mismatches += 1;
            }
        }

        if address_mismatches * 2 > approved.len() {
            AlertSeverity::Critical
        } else if address_mismatches > 0 {
            AlertSeverity::High
        } else if value_mismatches > 1 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }
}
