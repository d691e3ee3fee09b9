//! Error types for numeric helpers.

use thiserror::Error;
use tlm_core::error::TlmError;

/// Errors raised by delays, filters and the equation solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericsError {
    #[error("{what} used before it was initialized with a simulation clock")]
    NotInitialized { what: &'static str },

    #[error("Delay index {idx} out of range [1, {size}]")]
    IndexOutOfRange { idx: usize, size: usize },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Singular denominator in {what}")]
    SingularDenominator { what: &'static str },

    #[error("Singular Jacobian in equation system of size {size}")]
    SingularMatrix { size: usize },

    #[error("Newton iteration did not converge after {iterations} iterations (residual={residual:e})")]
    ConvergenceFailed { iterations: usize, residual: f64 },

    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}

pub type NumericsResult<T> = Result<T, NumericsError>;

impl From<TlmError> for NumericsError {
    fn from(e: TlmError) -> Self {
        match e {
            TlmError::NonFinite { what, value } => NumericsError::NonFinite { what, value },
            TlmError::InvalidArg { what } => NumericsError::InvalidArg { what },
            TlmError::IndexOob { index, len, .. } => NumericsError::IndexOutOfRange {
                idx: index,
                size: len,
            },
            TlmError::IncompatibleVersion { .. } => NumericsError::InvalidArg {
                what: "library version",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = NumericsError::IndexOutOfRange { idx: 7, size: 4 };
        assert_eq!(err.to_string(), "Delay index 7 out of range [1, 4]");
    }

    #[test]
    fn error_conversion() {
        let core_err = TlmError::NonFinite {
            what: "flow",
            value: f64::INFINITY,
        };
        let err: NumericsError = core_err.into();
        assert!(matches!(err, NumericsError::NonFinite { what: "flow", .. }));
    }
}
