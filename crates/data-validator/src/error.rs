//! Validation Error Types

use thiserror::Error;

/// Errors during data validation, cleaning and scaling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Input sequence has no values at all
    #[error("voltage sequence is empty")]
    EmptyInput,

    /// Voltage sequence length differs from the configured cell count
    #[error("expected {expected} voltage values, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },

    /// NaN or infinite value in an input
    #[error("value at position {index} is not a finite number")]
    NonFinite { index: usize },

    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Feature count differs from what a fitted transform expects
    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Fit requested on zero rows
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Configuration that can never produce valid output
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisted state could not be decoded or is inconsistent
    #[error("Corrupt artifact: {0}")]
    Corrupt(String),
}
