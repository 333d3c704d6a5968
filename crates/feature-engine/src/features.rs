//! Feature Vector Assembly

use crate::statistics::StatisticalFeatures;
use data_validator::{ValidationError, Validator};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of aggregate features per pack
pub const FEATURE_DIMENSION: usize = 6;

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; FEATURE_DIMENSION] = ["mean", "median", "std", "min", "max", "skew"];

/// Aggregate features of one pack, in `FEATURE_NAMES` order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Raw feature values (6 dimensions)
    pub values: Vec<f64>,
}

impl FeatureVector {
    /// Mean cell voltage
    pub fn mean(&self) -> f64 {
        self.values[0]
    }

    /// Median cell voltage
    pub fn median(&self) -> f64 {
        self.values[1]
    }

    /// Sample standard deviation of cell voltages
    pub fn std_dev(&self) -> f64 {
        self.values[2]
    }

    /// Lowest cell voltage
    pub fn min(&self) -> f64 {
        self.values[3]
    }

    /// Highest cell voltage
    pub fn max(&self) -> f64 {
        self.values[4]
    }

    /// Skewness of cell voltages
    pub fn skewness(&self) -> f64 {
        self.values[5]
    }

    /// Feature values as a slice
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl From<StatisticalFeatures> for FeatureVector {
    fn from(stats: StatisticalFeatures) -> Self {
        Self {
            values: vec![
                stats.mean,
                stats.median,
                stats.std_dev,
                stats.min,
                stats.max,
                stats.skewness,
            ],
        }
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self {
            values: vec![0.0; FEATURE_DIMENSION],
        }
    }
}

/// Feature extractor for per-cell voltage sequences of a fixed cell count
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    validator: Validator,
}

impl FeatureExtractor {
    /// Create a new feature extractor for packs of `cell_count` cells
    pub fn new(cell_count: usize) -> Result<Self, ValidationError> {
        Ok(Self {
            validator: Validator::with_cell_count(cell_count)?,
        })
    }

    /// Configured cell count
    pub fn cell_count(&self) -> usize {
        self.validator.cell_count()
    }

    /// Extract the aggregate features of one pack
    pub fn extract(&self, voltages: &[f64]) -> Result<FeatureVector, ValidationError> {
        self.validator.validate_voltages(voltages)?;
        Ok(StatisticalFeatures::compute(voltages).into())
    }

    /// Extract features for many packs, failing on the first invalid one
    pub fn extract_batch(&self, packs: &[Vec<f64>]) -> Result<Vec<FeatureVector>, ValidationError> {
        debug!("Extracting features for {} packs", packs.len());
        packs.iter().map(|voltages| self.extract(voltages)).collect()
    }
}
