//! Storage Layer
//!
//! Provides atomic file persistence for the trained artifacts (scaler, model,
//! metrics). Writers go through temp-file-then-rename so readers never see a
//! partially written artifact.

mod repository;

pub use repository::{ArtifactKind, ArtifactPaths, ArtifactStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
