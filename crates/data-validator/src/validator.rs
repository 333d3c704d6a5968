//! Voltage and label validation

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Default number of cells in a pack (U1..U21)
pub const DEFAULT_CELL_COUNT: usize = 21;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Number of per-cell voltages every record must carry
    pub cell_count: usize,
    /// SOH label valid range
    pub soh_range: (f64, f64),
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            cell_count: DEFAULT_CELL_COUNT,
            soh_range: (0.0, 1.0),
        }
    }
}

/// Validator for battery pack readings
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    ///
    /// At least two cells are required so that a sample standard deviation
    /// exists for every pack.
    pub fn new(config: ValidationConfig) -> Result<Self, ValidationError> {
        if config.cell_count < 2 {
            return Err(ValidationError::InvalidConfig(format!(
                "cell_count must be at least 2, got {}",
                config.cell_count
            )));
        }
        Ok(Self { config })
    }

    /// Validator for a given cell count with default label range
    pub fn with_cell_count(cell_count: usize) -> Result<Self, ValidationError> {
        Self::new(ValidationConfig {
            cell_count,
            ..Default::default()
        })
    }

    /// Configured cell count
    pub fn cell_count(&self) -> usize {
        self.config.cell_count
    }

    /// Validate a single value against a range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if !(value >= range.0 && value <= range.1) {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a pack's voltage sequence: non-empty, right length, all finite
    pub fn validate_voltages(&self, voltages: &[f64]) -> Result<(), ValidationError> {
        if voltages.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        if voltages.len() != self.config.cell_count {
            return Err(ValidationError::CellCountMismatch {
                expected: self.config.cell_count,
                actual: voltages.len(),
            });
        }
        ensure_finite(voltages)
    }

    /// Validate an SOH label
    pub fn validate_soh(&self, soh: f64) -> Result<(), ValidationError> {
        self.validate_range("soh", soh, self.config.soh_range)
    }

    /// Validate a health threshold
    pub fn validate_threshold(&self, threshold: f64) -> Result<(), ValidationError> {
        self.validate_range("threshold", threshold, (0.0, 1.0))
    }
}

/// Fail on the first NaN or infinite value
pub fn ensure_finite(values: &[f64]) -> Result<(), ValidationError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ValidationError::NonFinite { index }),
        None => Ok(()),
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }
}
