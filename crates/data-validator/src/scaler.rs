//! Feature Standardization

use crate::error::ValidationError;
use crate::stats::{mean, population_std};
use crate::validator::ensure_finite;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Version tag written into persisted scaler state
const SCALER_FORMAT_VERSION: u16 = 1;

/// Per-feature standardization learned once from training features
///
/// `transform` computes `(x - mean) / std` per column. A column whose fitted
/// std is 0 is divided by 1 instead, so a value equal to the mean maps to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalerState", into = "ScalerState")]
pub struct Scaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

/// On-disk form of a [`Scaler`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerState {
    format_version: u16,
    n_features: usize,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Scaler {
    /// Fit per-column mean and population std
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ValidationError> {
        let first = rows.first().ok_or(ValidationError::EmptyDataset)?;
        let n_features = first.len();
        if n_features == 0 {
            return Err(ValidationError::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }

        for row in rows {
            if row.len() != n_features {
                return Err(ValidationError::ShapeMismatch {
                    expected: n_features,
                    actual: row.len(),
                });
            }
            ensure_finite(row)?;
        }

        let mut means = Vec::with_capacity(n_features);
        let mut stds = Vec::with_capacity(n_features);
        let mut column = Vec::with_capacity(rows.len());
        for col in 0..n_features {
            column.clear();
            column.extend(rows.iter().map(|row| row[col]));
            let m = mean(&column);
            means.push(m);
            stds.push(population_std(&column, m));
        }

        info!("Fitted scaler on {} rows x {} features", rows.len(), n_features);
        debug!("Scaler mean={:?} std={:?}", means, stds);

        Ok(Self {
            mean: means,
            std: stds,
        })
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Fitted per-column means
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Fitted per-column population standard deviations
    pub fn std(&self) -> &[f64] {
        &self.std
    }

    /// Standardize one feature vector
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ValidationError> {
        if features.len() != self.n_features() {
            return Err(ValidationError::ShapeMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| {
                let divisor = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / divisor
            })
            .collect())
    }

    /// Standardize many feature vectors
    pub fn transform_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ValidationError> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    /// Serialize to the persisted binary form
    pub fn to_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        postcard::to_allocvec(self).map_err(|e| ValidationError::Corrupt(e.to_string()))
    }

    /// Decode persisted state, rejecting a feature count other than `expected_features`
    pub fn from_bytes(bytes: &[u8], expected_features: usize) -> Result<Self, ValidationError> {
        let scaler: Scaler =
            postcard::from_bytes(bytes).map_err(|e| ValidationError::Corrupt(e.to_string()))?;
        if scaler.n_features() != expected_features {
            return Err(ValidationError::ShapeMismatch {
                expected: expected_features,
                actual: scaler.n_features(),
            });
        }
        Ok(scaler)
    }
}

impl From<Scaler> for ScalerState {
    fn from(scaler: Scaler) -> Self {
        Self {
            format_version: SCALER_FORMAT_VERSION,
            n_features: scaler.mean.len(),
            mean: scaler.mean,
            std: scaler.std,
        }
    }
}

impl TryFrom<ScalerState> for Scaler {
    type Error = ValidationError;

    fn try_from(state: ScalerState) -> Result<Self, Self::Error> {
        if state.format_version != SCALER_FORMAT_VERSION {
            return Err(ValidationError::Corrupt(format!(
                "unsupported scaler format version {}",
                state.format_version
            )));
        }
        if state.mean.len() != state.n_features || state.std.len() != state.n_features {
            return Err(ValidationError::Corrupt(format!(
                "scaler declares {} features but stores {} means and {} stds",
                state.n_features,
                state.mean.len(),
                state.std.len()
            )));
        }
        if state.mean.iter().chain(&state.std).any(|v| !v.is_finite())
            || state.std.iter().any(|s| *s < 0.0)
        {
            return Err(ValidationError::Corrupt(
                "scaler parameters must be finite with non-negative std".to_string(),
            ));
        }
        Ok(Self {
            mean: state.mean,
            std: state.std,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Vec<f64>> {
        (0..40)
            .map(|i| {
                let x = i as f64;
                vec![
                    3.4 + x * 0.01,
                    3.5 - x * 0.005,
                    0.02 + (i % 7) as f64 * 0.003,
                    3.1 + (i % 5) as f64 * 0.02,
                    3.9 + x * 0.002,
                    -0.5 + (i % 3) as f64 * 0.4,
                ]
            })
            .collect()
    }

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_std() {
        let rows = sample_rows();
        let scaler = Scaler::fit(&rows).unwrap();
        let scaled = scaler.transform_batch(&rows).unwrap();

        for col in 0..scaler.n_features() {
            let column: Vec<f64> = scaled.iter().map(|r| r[col]).collect();
            let m = mean(&column);
            let s = population_std(&column, m);
            assert!(m.abs() < 1e-9, "column {col} mean {m}");
            assert!((s - 1.0).abs() < 1e-9, "column {col} std {s}");
        }
    }

    #[test]
    fn test_zero_std_column_maps_mean_to_zero() {
        let rows = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let scaler = Scaler::fit(&rows).unwrap();
        assert_eq!(scaler.std()[1], 0.0);

        let out = scaler.transform(&[2.0, 5.0]).unwrap();
        assert_eq!(out[1], 0.0);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let scaler = Scaler::fit(&sample_rows()).unwrap();
        assert_eq!(scaler.n_features(), 6);
        assert_eq!(
            scaler.transform(&[0.0; 5]),
            Err(ValidationError::ShapeMismatch {
                expected: 6,
                actual: 5
            })
        );
    }

    #[test]
    fn test_empty_and_ragged_fit() {
        assert_eq!(Scaler::fit(&[]), Err(ValidationError::EmptyDataset));
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            Scaler::fit(&ragged),
            Err(ValidationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_bytes_round_trip() {
        let rows = sample_rows();
        let scaler = Scaler::fit(&rows).unwrap();
        let bytes = scaler.to_bytes().unwrap();
        let restored = Scaler::from_bytes(&bytes, 6).unwrap();

        assert_eq!(restored, scaler);
        assert_eq!(
            restored.transform(&rows[3]).unwrap(),
            scaler.transform(&rows[3]).unwrap()
        );
    }

    #[test]
    fn test_from_bytes_rejects_unexpected_feature_count() {
        let bytes = Scaler::fit(&sample_rows()).unwrap().to_bytes().unwrap();
        assert_eq!(
            Scaler::from_bytes(&bytes, 21),
            Err(ValidationError::ShapeMismatch {
                expected: 21,
                actual: 6
            })
        );
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            Scaler::from_bytes(&[0xff, 0x01], 6),
            Err(ValidationError::Corrupt(_))
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn transform_of_finite_input_is_finite(
                rows in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 3), 1..20),
                x in prop::collection::vec(-10.0f64..10.0, 3),
            ) {
                let scaler = Scaler::fit(&rows).unwrap();
                let out = scaler.transform(&x).unwrap();
                prop_assert!(out.iter().all(|v| v.is_finite()));
            }
        }
    }
}
