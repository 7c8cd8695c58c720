//! Errors
//!
//! Custom error types used throughout the `locart` crate.
use thiserror::Error;

/// Errors that can occur while calibrating or predicting intervals.
#[derive(Debug, Error)]
pub enum LocartError {
    /// An operation was called on a component that has not been fit.
    #[error("The {0} has not been fit, call fit before this operation.")]
    NotFitted(&'static str),
    /// Covariate shape inconsistent with the fitted state.
    #[error("Dimension mismatch, expected {expected} but {actual} provided.")]
    DimensionMismatch { expected: usize, actual: usize },
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Calibration set too small for the requested miscoverage level.
    #[error("Insufficient calibration data, at least {needed} examples required but {got} provided.")]
    InsufficientData { needed: usize, got: usize },
    /// A non-finite value was found where a finite one is required.
    #[error("Non-finite value {0} found in the data.")]
    NonFiniteValue(f64),
    /// Unable to write calibrator to file.
    #[error("Unable to write calibrator to file: {0}")]
    UnableToWrite(String),
    /// Unable to read calibrator from file.
    #[error("Unable to read calibrator from a file {0}")]
    UnableToRead(String),
}
