//! SOH Inference Engine
//!
//! Linear regression over standardized pack features, and the inference
//! service that loads the persisted scaler and model once and scores packs.

mod engine;
mod model;

pub use engine::{
    HealthStatus, InferenceConfig, InferenceEngine, LoadedArtifacts, PredictionResponse,
    PredictionResult, DEFAULT_HEALTH_THRESHOLD,
};
pub use model::{Evaluation, ModelMetrics, RankPolicy, RegressionModel};

use data_validator::ValidationError;
use storage::StorageError;
use thiserror::Error;

/// Errors during model fitting and inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{0}")]
    InvalidInput(ValidationError),
    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,
    #[error("design matrix has rank {rank} but {columns} columns")]
    RankDeficient { rank: usize, columns: usize },
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("Artifact load failed: {0}")]
    ArtifactLoad(String),
    #[error("Model fit failed: {0}")]
    FitFailed(String),
}

impl InferenceError {
    /// Message safe to hand to an external caller (no paths or internals)
    pub fn public_message(&self) -> String {
        match self {
            InferenceError::InvalidInput(_) => self.to_string(),
            InferenceError::ArtifactNotFound(_) | InferenceError::ArtifactLoad(_) => {
                "model artifacts are not available".to_string()
            }
            _ => "prediction failed".to_string(),
        }
    }

    /// Whether the caller's input caused the failure
    ///
    /// Voltage count errors are `InvalidInput`; a `ShapeMismatch` only arises
    /// between internal components and is never the caller's fault.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, InferenceError::InvalidInput(_))
    }

    /// Whether the failure is missing or unusable artifacts
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            InferenceError::ArtifactNotFound(_) | InferenceError::ArtifactLoad(_)
        )
    }
}

impl From<ValidationError> for InferenceError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::ShapeMismatch { expected, actual } => {
                InferenceError::ShapeMismatch { expected, actual }
            }
            ValidationError::EmptyDataset => InferenceError::EmptyDataset,
            ValidationError::Corrupt(message) => InferenceError::ArtifactLoad(message),
            other => InferenceError::InvalidInput(other),
        }
    }
}

impl From<StorageError> for InferenceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => InferenceError::ArtifactNotFound(path),
            other => InferenceError::ArtifactLoad(other.to_string()),
        }
    }
}
