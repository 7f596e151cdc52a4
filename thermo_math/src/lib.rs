//! # Thermo Math
//!
//! Numeric kernels used by the battery telemetry forecasting workbench.
//! Every function here works on plain `f64` slices where `NaN` marks a
//! missing observation; nothing in this crate knows about timestamps or
//! column names.

use thiserror::Error;

pub mod interpolation;
pub mod reducers;
pub mod regression;
pub mod rolling;
pub mod stats;

pub use reducers::Reducer;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Singular system: {0}")]
    SingularMatrix(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Returns `true` when `value` marks a missing observation.
#[inline]
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_the_missing_marker() {
        assert!(is_missing(f64::NAN));
        assert!(!is_missing(0.0));
        assert!(!is_missing(f64::INFINITY));
    }
}
