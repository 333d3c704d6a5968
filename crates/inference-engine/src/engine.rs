//! Inference Engine Implementation

use crate::model::RegressionModel;
use crate::InferenceError;
use data_validator::{Scaler, Validator, DEFAULT_CELL_COUNT};
use feature_engine::{FeatureExtractor, FEATURE_DIMENSION};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use storage::{ArtifactKind, ArtifactStore};
use tracing::{debug, info, warn};

/// SOH at or above which a pack is classified healthy
pub const DEFAULT_HEALTH_THRESHOLD: f64 = 0.6;

/// Inference configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Number of per-cell voltages in a request
    pub cell_count: usize,
    /// Healthy/Problem cutoff
    pub health_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            cell_count: DEFAULT_CELL_COUNT,
            health_threshold: DEFAULT_HEALTH_THRESHOLD,
        }
    }
}

impl InferenceConfig {
    /// Reject a cell count below 2 or a threshold outside [0, 1]
    pub fn validate(&self) -> Result<(), InferenceError> {
        Validator::with_cell_count(self.cell_count)?.validate_threshold(self.health_threshold)?;
        Ok(())
    }
}

/// Binary health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// SOH at or above the threshold
    Healthy,
    /// SOH below the threshold
    Problem,
}

impl HealthStatus {
    /// Classify an SOH score against a threshold
    pub fn classify(soh: f64, threshold: f64) -> Self {
        if soh >= threshold {
            HealthStatus::Healthy
        } else {
            HealthStatus::Problem
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Problem => "Problem",
        }
    }
}

/// Scored pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// State of health in [0, 1]
    pub soh: f64,
    /// `soh` × 100
    pub soh_percentage: f64,
    /// Classification against `threshold`
    pub health_status: HealthStatus,
    /// Threshold used for the classification
    pub threshold: f64,
}

impl PredictionResult {
    fn new(soh: f64, threshold: f64) -> Self {
        Self {
            soh,
            soh_percentage: soh * 100.0,
            health_status: HealthStatus::classify(soh, threshold),
            threshold,
        }
    }
}

/// Wire form of a prediction, discriminated by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictionResponse {
    Success(PredictionResult),
    Error { error: String },
}

impl PredictionResponse {
    /// Whether this is a success response
    pub fn is_success(&self) -> bool {
        matches!(self, PredictionResponse::Success(_))
    }
}

impl From<Result<PredictionResult, InferenceError>> for PredictionResponse {
    fn from(result: Result<PredictionResult, InferenceError>) -> Self {
        match result {
            Ok(prediction) => PredictionResponse::Success(prediction),
            Err(e) => PredictionResponse::Error {
                error: e.public_message(),
            },
        }
    }
}

/// Scaler and model loaded together from the artifact store
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    scaler: Scaler,
    model: RegressionModel,
}

impl LoadedArtifacts {
    /// Pair a scaler with a model, checking their feature counts agree
    pub fn new(scaler: Scaler, model: RegressionModel) -> Result<Self, InferenceError> {
        if model.n_features() != scaler.n_features() {
            return Err(InferenceError::ShapeMismatch {
                expected: scaler.n_features(),
                actual: model.n_features(),
            });
        }
        Ok(Self { scaler, model })
    }

    /// The fitted scaler
    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// The fitted model
    pub fn model(&self) -> &RegressionModel {
        &self.model
    }
}

/// SOH inference service
///
/// Owns its artifact store and a single immutable copy of the loaded
/// artifacts. The first call that needs them loads them; concurrent first
/// callers wait for that one load. A failed load is retried by the next call.
pub struct InferenceEngine {
    store: ArtifactStore,
    config: InferenceConfig,
    extractor: FeatureExtractor,
    validator: Validator,
    artifacts: OnceCell<LoadedArtifacts>,
}

impl InferenceEngine {
    /// Create a new inference engine over an artifact store
    pub fn new(store: ArtifactStore, config: InferenceConfig) -> Result<Self, InferenceError> {
        info!(
            "Creating inference engine: cell_count={}, threshold={}",
            config.cell_count, config.health_threshold
        );
        config.validate()?;
        let validator = Validator::with_cell_count(config.cell_count)?;

        Ok(Self {
            extractor: FeatureExtractor::new(config.cell_count)?,
            validator,
            store,
            config,
            artifacts: OnceCell::new(),
        })
    }

    /// Load the artifacts now instead of on first prediction
    pub fn load(&self) -> Result<&LoadedArtifacts, InferenceError> {
        self.artifacts.get_or_try_init(|| self.load_from_store())
    }

    fn load_from_store(&self) -> Result<LoadedArtifacts, InferenceError> {
        let scaler_bytes = self.store.read(ArtifactKind::Scaler)?;
        let model_bytes = self.store.read(ArtifactKind::Model)?;

        // Any shape disagreement here is a bad artifact, not a bad request
        let artifacts = Scaler::from_bytes(&scaler_bytes, FEATURE_DIMENSION)
            .map_err(InferenceError::from)
            .and_then(|scaler| {
                let model = RegressionModel::from_bytes(&model_bytes, FEATURE_DIMENSION)?;
                LoadedArtifacts::new(scaler, model)
            })
            .map_err(|e| match e {
                InferenceError::ShapeMismatch { expected, actual } => InferenceError::ArtifactLoad(
                    format!("artifact has {actual} features, expected {expected}"),
                ),
                other => other,
            })?;

        info!(
            "Loaded scaler and model ({} features) from {}",
            FEATURE_DIMENSION,
            self.store.path(ArtifactKind::Model).display()
        );
        Ok(artifacts)
    }

    /// Check if artifacts are loaded
    pub fn is_loaded(&self) -> bool {
        self.artifacts.get().is_some()
    }

    /// Engine configuration
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Score a pack with the configured threshold
    pub fn predict(&self, voltages: &[f64]) -> Result<PredictionResult, InferenceError> {
        self.predict_with_threshold(voltages, self.config.health_threshold)
    }

    /// Score a pack with a caller-supplied threshold in [0, 1]
    pub fn predict_with_threshold(
        &self,
        voltages: &[f64],
        threshold: f64,
    ) -> Result<PredictionResult, InferenceError> {
        let start = Instant::now();

        self.validator.validate_threshold(threshold)?;
        let features = self.extractor.extract(voltages)?;

        let artifacts = self.load()?;
        let scaled = artifacts.scaler.transform(features.as_slice())?;
        let soh = artifacts.model.predict(&scaled)?;

        let result = PredictionResult::new(soh, threshold);
        debug!(
            "Prediction: soh={:.4} status={} in {}us",
            result.soh,
            result.health_status.as_str(),
            start.elapsed().as_micros()
        );
        Ok(result)
    }

    /// Score a pack and convert the outcome into its wire form
    pub fn respond(&self, voltages: &[f64]) -> PredictionResponse {
        self.respond_with_threshold(voltages, None)
    }

    /// Like [`respond`](Self::respond) with an optional threshold override
    pub fn respond_with_threshold(&self, voltages: &[f64], threshold: Option<f64>) -> PredictionResponse {
        let result =
            self.predict_with_threshold(voltages, threshold.unwrap_or(self.config.health_threshold));
        if let Err(e) = &result {
            warn!("Prediction failed: {}", e);
        }
        result.into()
    }
}
