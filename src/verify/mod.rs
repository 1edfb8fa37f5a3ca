//! Output Verification
//!
//! Pure functions over (actual, approved) output lists:
//!     comparator.rs — first-violation comparison (address before value)
//!     severity.rs   — risk scoring of a mismatch
//!
//! Address substitution is the hijack signature and always outranks value
//! drift, which is expected from fee rounding between templates.

pub mod comparator;
pub mod severity;

pub use comparator::{ComparisonResult, MismatchReason, OutputComparator, DEFAULT_VALUE_TOLERANCE};
pub use severity::SeverityClassifier;

/// True when `actual` is within `tolerance` (fraction) of `approved`.
pub fn value_within_tolerance(actual: i64, approved: i64, tolerance: f64) -> bool {
    let diff = (i128::from(actual) - i128::from(approved)).unsigned_abs() as f64;
    diff <= tolerance * approved as f64
}
