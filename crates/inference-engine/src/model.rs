//! Linear Regression Model

use crate::InferenceError;
use data_validator::ensure_finite;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Version tag written into persisted model state
const MODEL_FORMAT_VERSION: u16 = 1;

/// What to do when the design matrix is rank deficient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Use the minimum-norm least-squares solution
    #[default]
    Pseudoinverse,
    /// Fail with `InferenceError::RankDeficient`
    Reject,
}

/// Held-out evaluation of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub r2: f64,
    pub mse: f64,
    pub mae: f64,
}

impl Evaluation {
    /// Attach the fit duration
    pub fn with_train_time(self, train_time_s: f64) -> ModelMetrics {
        ModelMetrics {
            r2: self.r2,
            mse: self.mse,
            mae: self.mae,
            train_time_s,
        }
    }
}

/// Metrics document persisted next to the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub r2: f64,
    pub mse: f64,
    pub mae: f64,
    pub train_time_s: f64,
}

/// Linear model over standardized features, predictions clipped to [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelState", into = "ModelState")]
pub struct RegressionModel {
    weights: Vec<f64>,
    bias: f64,
}

/// On-disk form of a [`RegressionModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelState {
    format_version: u16,
    n_features: usize,
    weights: Vec<f64>,
    bias: f64,
}

impl RegressionModel {
    /// Build a model from known parameters
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, InferenceError> {
        if weights.is_empty() {
            return Err(InferenceError::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }
        ensure_finite(&weights)?;
        ensure_finite(&[bias])?;
        Ok(Self { weights, bias })
    }

    /// Ordinary least squares with intercept, pseudoinverse on rank deficiency
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self, InferenceError> {
        Self::fit_with(x, y, RankPolicy::Pseudoinverse)
    }

    /// Ordinary least squares with an explicit rank-deficiency policy
    ///
    /// Solves `[1 | X] β ≈ y` through an SVD; singular values at or below
    /// `max(n, p + 1) · ε · σ_max` are treated as zero.
    pub fn fit_with(x: &[Vec<f64>], y: &[f64], policy: RankPolicy) -> Result<Self, InferenceError> {
        let n_samples = x.len();
        if n_samples == 0 {
            return Err(InferenceError::EmptyDataset);
        }
        if y.len() != n_samples {
            return Err(InferenceError::ShapeMismatch {
                expected: n_samples,
                actual: y.len(),
            });
        }

        let n_features = x[0].len();
        if n_features == 0 {
            return Err(InferenceError::ShapeMismatch {
                expected: 1,
                actual: 0,
            });
        }
        for row in x {
            if row.len() != n_features {
                return Err(InferenceError::ShapeMismatch {
                    expected: n_features,
                    actual: row.len(),
                });
            }
            ensure_finite(row)?;
        }
        ensure_finite(y)?;

        let columns = n_features + 1;
        let design = DMatrix::from_fn(n_samples, columns, |i, j| {
            if j == 0 {
                1.0
            } else {
                x[i][j - 1]
            }
        });
        let target = DVector::from_column_slice(y);

        let svd = design.svd(true, true);
        let max_singular = svd.singular_values.iter().cloned().fold(0.0, f64::max);
        let tolerance = max_singular * n_samples.max(columns) as f64 * f64::EPSILON;
        let rank = svd.rank(tolerance);

        if rank < columns {
            match policy {
                RankPolicy::Reject => {
                    return Err(InferenceError::RankDeficient { rank, columns });
                }
                RankPolicy::Pseudoinverse => {
                    warn!(
                        "Design matrix is rank deficient (rank {} < {} columns), using pseudoinverse",
                        rank, columns
                    );
                }
            }
        }

        let beta = svd
            .solve(&target, tolerance)
            .map_err(|e| InferenceError::FitFailed(e.to_string()))?;

        let bias = beta[0];
        let weights: Vec<f64> = beta.iter().skip(1).cloned().collect();
        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(InferenceError::FitFailed(
                "solver produced non-finite coefficients".to_string(),
            ));
        }

        info!(
            "Fitted linear model on {} samples x {} features (rank {})",
            n_samples, n_features, rank
        );
        debug!("Model weights={:?} bias={}", weights, bias);

        Ok(Self { weights, bias })
    }

    /// Number of features the model expects
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Per-feature weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Intercept term
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Unclipped `w · x + b`
    ///
    /// Every product and partial sum saturates at `±f64::MAX`, so the result is
    /// finite for any finite input.
    pub fn decision_value(&self, x: &[f64]) -> Result<f64, InferenceError> {
        if x.len() != self.weights.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.weights.len(),
                actual: x.len(),
            });
        }
        ensure_finite(x)?;
        let dot = self
            .weights
            .iter()
            .zip(x)
            .fold(0.0, |acc, (w, v)| saturate(acc + saturate(w * v)));
        Ok(saturate(dot + self.bias))
    }

    /// Predict SOH for one standardized feature vector, clipped to [0, 1]
    pub fn predict(&self, x: &[f64]) -> Result<f64, InferenceError> {
        Ok(self.decision_value(x)?.clamp(0.0, 1.0))
    }

    /// Predict many rows
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, InferenceError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// R², MSE and MAE of the clipped predictions on held-out data
    ///
    /// With zero-variance labels R² is 1.0 for a perfect fit and 0.0 otherwise.
    pub fn evaluate(&self, x: &[Vec<f64>], y: &[f64]) -> Result<Evaluation, InferenceError> {
        if x.is_empty() {
            return Err(InferenceError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }

        let predictions = self.predict_batch(x)?;
        let n = y.len() as f64;
        let y_mean = y.iter().sum::<f64>() / n;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_err = 0.0;
        for (actual, predicted) in y.iter().zip(&predictions) {
            let residual = actual - predicted;
            ss_res += residual * residual;
            abs_err += residual.abs();
            ss_tot += (actual - y_mean) * (actual - y_mean);
        }

        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        Ok(Evaluation {
            r2,
            mse: ss_res / n,
            mae: abs_err / n,
        })
    }

    /// Serialize to the persisted binary form
    pub fn to_bytes(&self) -> Result<Vec<u8>, InferenceError> {
        postcard::to_allocvec(self).map_err(|e| InferenceError::ArtifactLoad(e.to_string()))
    }

    /// Decode persisted state, rejecting a feature count other than `expected_features`
    pub fn from_bytes(bytes: &[u8], expected_features: usize) -> Result<Self, InferenceError> {
        let model: RegressionModel =
            postcard::from_bytes(bytes).map_err(|e| InferenceError::ArtifactLoad(e.to_string()))?;
        if model.n_features() != expected_features {
            return Err(InferenceError::ShapeMismatch {
                expected: expected_features,
                actual: model.n_features(),
            });
        }
        Ok(model)
    }
}

fn saturate(value: f64) -> f64 {
    value.clamp(-f64::MAX, f64::MAX)
}

impl From<RegressionModel> for ModelState {
    fn from(model: RegressionModel) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            n_features: model.weights.len(),
            weights: model.weights,
            bias: model.bias,
        }
    }
}

impl TryFrom<ModelState> for RegressionModel {
    type Error = String;

    fn try_from(state: ModelState) -> Result<Self, Self::Error> {
        if state.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "unsupported model format version {}",
                state.format_version
            ));
        }
        if state.weights.len() != state.n_features {
            return Err(format!(
                "model declares {} features but stores {} weights",
                state.n_features,
                state.weights.len()
            ));
        }
        RegressionModel::new(state.weights, state.bias).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 0.5 + 0.1·x0 - 0.05·x1 with small deterministic wiggle in the inputs
    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                vec![2.0 * t - 1.0, ((i * 7) % 11) as f64 / 11.0 - 0.5]
            })
            .collect();
        let y = x.iter().map(|r| 0.5 + 0.1 * r[0] - 0.05 * r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_recovers_exact_coefficients() {
        let (x, y) = linear_data(50);
        let model = RegressionModel::fit(&x, &y).unwrap();
        assert!((model.bias() - 0.5).abs() < 1e-9);
        assert!((model.weights()[0] - 0.1).abs() < 1e-9);
        assert!((model.weights()[1] + 0.05).abs() < 1e-9);

        let eval = model.evaluate(&x, &y).unwrap();
        assert!(eval.r2 > 0.999_999);
        assert!(eval.mse < 1e-12);
        assert!(eval.mae < 1e-6);
    }

    #[test]
    fn test_predictions_are_clipped() {
        let model = RegressionModel::new(vec![1.0, 0.0], 0.5).unwrap();
        assert_eq!(model.predict(&[10.0, 0.0]).unwrap(), 1.0);
        assert_eq!(model.predict(&[-10.0, 0.0]).unwrap(), 0.0);
        assert!((model.predict(&[0.25, 3.0]).unwrap() - 0.75).abs() < 1e-12);
        assert!(model.decision_value(&[10.0, 0.0]).unwrap() > 1.0);
    }

    #[test]
    fn test_overflowing_terms_saturate() {
        let model = RegressionModel::new(vec![10.0, 10.0], 0.0).unwrap();
        // +inf and -inf terms would sum to NaN without saturation
        assert_eq!(model.decision_value(&[1e308, -1e308]).unwrap(), 0.0);
        assert_eq!(model.predict(&[1e308, -1e308]).unwrap(), 0.0);
        assert_eq!(model.predict(&[1e308, 1e308]).unwrap(), 1.0);
        assert_eq!(model.decision_value(&[1e308, 1e308]).unwrap(), f64::MAX);
        assert_eq!(model.predict(&[-1e308, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_metrics_use_clipped_predictions() {
        // Raw prediction 1.5 for label 1.0: clipped error is 0
        let model = RegressionModel::new(vec![1.0], 0.5).unwrap();
        let eval = model.evaluate(&[vec![1.0], vec![0.0]], &[1.0, 0.5]).unwrap();
        assert_eq!(eval.mse, 0.0);
        assert_eq!(eval.mae, 0.0);
        assert_eq!(eval.r2, 1.0);
    }

    #[test]
    fn test_constant_labels_r2() {
        let model = RegressionModel::new(vec![0.0], 0.7).unwrap();
        let perfect = model.evaluate(&[vec![1.0], vec![2.0]], &[0.7, 0.7]).unwrap();
        assert_eq!(perfect.r2, 1.0);
        let off = model.evaluate(&[vec![1.0], vec![2.0]], &[0.6, 0.6]).unwrap();
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_empty_and_mismatched_inputs() {
        assert!(matches!(
            RegressionModel::fit(&[], &[]),
            Err(InferenceError::EmptyDataset)
        ));
        assert!(matches!(
            RegressionModel::fit(&[vec![1.0], vec![2.0]], &[0.5]),
            Err(InferenceError::ShapeMismatch { .. })
        ));
        let model = RegressionModel::new(vec![0.1; 6], 0.5).unwrap();
        assert!(matches!(
            model.predict(&[0.0; 5]),
            Err(InferenceError::ShapeMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_duplicate_column_uses_pseudoinverse() {
        // Second column is an exact copy of the first
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 * 0.1, i as f64 * 0.1]).collect();
        let y: Vec<f64> = x.iter().map(|r| 0.2 + 0.3 * r[0]).collect();

        let model = RegressionModel::fit(&x, &y).unwrap();
        // Minimum-norm solution splits the weight evenly
        assert!((model.weights()[0] - 0.15).abs() < 1e-9);
        assert!((model.weights()[1] - 0.15).abs() < 1e-9);
        assert!((model.predict(&[1.0, 1.0]).unwrap() - 0.5).abs() < 1e-9);

        assert!(matches!(
            RegressionModel::fit_with(&x, &y, RankPolicy::Reject),
            Err(InferenceError::RankDeficient { rank: 2, columns: 3 })
        ));
    }

    #[test]
    fn test_fewer_rows_than_columns() {
        let x = vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.1, -0.2]];
        let y = vec![0.8, 0.6];
        let model = RegressionModel::fit(&x, &y).unwrap();
        // Underdetermined: the pseudoinverse still interpolates the samples
        assert!((model.predict(&x[0]).unwrap() - 0.8).abs() < 1e-9);
        assert!((model.predict(&x[1]).unwrap() - 0.6).abs() < 1e-9);
        assert!(matches!(
            RegressionModel::fit_with(&x, &y, RankPolicy::Reject),
            Err(InferenceError::RankDeficient { .. })
        ));
    }

    #[test]
    fn test_bytes_round_trip() {
        let (x, y) = linear_data(30);
        let model = RegressionModel::fit(&x, &y).unwrap();
        let restored = RegressionModel::from_bytes(&model.to_bytes().unwrap(), 2).unwrap();
        assert_eq!(restored, model);
        for row in &x {
            assert_eq!(restored.predict(row).unwrap(), model.predict(row).unwrap());
        }
        assert!(matches!(
            RegressionModel::from_bytes(&model.to_bytes().unwrap(), 6),
            Err(InferenceError::ShapeMismatch {
                expected: 6,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        assert!(RegressionModel::new(vec![f64::NAN], 0.0).is_err());
        assert!(RegressionModel::new(vec![1.0], f64::INFINITY).is_err());
        assert!(RegressionModel::new(vec![], 0.0).is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prediction_always_in_unit_interval(
                weights in prop::collection::vec(-100.0f64..100.0, 6),
                bias in -100.0f64..100.0,
                x in prop::collection::vec(prop::num::f64::NORMAL | prop::num::f64::ZERO, 6),
            ) {
                let model = RegressionModel::new(weights, bias).unwrap();
                let p = model.predict(&x).unwrap();
                prop_assert!((0.0..=1.0).contains(&p));
            }

            #[test]
            fn prediction_is_idempotent(x in prop::collection::vec(-5.0f64..5.0, 2)) {
                let (xs, ys) = linear_data(25);
                let model = RegressionModel::fit(&xs, &ys).unwrap();
                prop_assert_eq!(model.predict(&x).unwrap(), model.predict(&x).unwrap());
            }
        }
    }
}
