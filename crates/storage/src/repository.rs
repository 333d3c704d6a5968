//! Artifact Repository Implementation

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The artifacts a training run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Fitted feature scaler (binary)
    Scaler,
    /// Fitted regression model (binary)
    Model,
    /// Evaluation metrics (JSON)
    Metrics,
}

impl ArtifactKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Model => "model",
            ArtifactKind::Metrics => "metrics",
        }
    }
}

/// Locations of the persisted artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside one directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            scaler: dir.join("scaler.bin"),
            model: dir.join("model.bin"),
            metrics: dir.join("metrics.json"),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir("artifacts")
    }
}

/// File-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: ArtifactPaths,
}

impl ArtifactStore {
    /// Create a store over explicit artifact paths
    pub fn new(paths: ArtifactPaths) -> Self {
        info!(
            "Artifact store: scaler={}, model={}, metrics={}",
            paths.scaler.display(),
            paths.model.display(),
            paths.metrics.display()
        );
        Self { paths }
    }

    /// Create a store using the default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(ArtifactPaths::in_dir(dir))
    }

    /// Configured paths
    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Path of one artifact
    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Scaler => &self.paths.scaler,
            ArtifactKind::Model => &self.paths.model,
            ArtifactKind::Metrics => &self.paths.metrics,
        }
    }

    /// Whether an artifact file currently exists
    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.path(kind).is_file()
    }

    /// Read an artifact's bytes
    pub fn read(&self, kind: ArtifactKind) -> Result<Vec<u8>, StorageError> {
        let path = self.path(kind);
        match fs::read(path) {
            Ok(bytes) => {
                debug!("Read {} ({} bytes)", kind.as_str(), bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(io_error(path, e)),
        }
    }

    /// Replace an artifact atomically: write a sibling temp file, fsync, rename
    pub fn write(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(kind);
        let tmp = stage(path, bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(path, e));
        }

        info!("Persisted {} -> {} ({} bytes)", kind.as_str(), path.display(), bytes.len());
        Ok(())
    }

    /// Replace several artifacts as one set
    ///
    /// Every temp file is written and synced before the first rename, so a
    /// failed write leaves all existing artifacts untouched.
    pub fn write_all(&self, items: &[(ArtifactKind, Vec<u8>)]) -> Result<(), StorageError> {
        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(items.len());
        for (kind, bytes) in items {
            let path = self.path(*kind);
            match stage(path, bytes) {
                Ok(tmp) => staged.push((tmp, path)),
                Err(e) => {
                    discard(&staged);
                    return Err(e);
                }
            }
        }

        for (i, (tmp, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, path) {
                discard(&staged[i..]);
                return Err(io_error(path, e));
            }
        }

        for (kind, bytes) in items {
            info!(
                "Persisted {} -> {} ({} bytes)",
                kind.as_str(),
                self.path(*kind).display(),
                bytes.len()
            );
        }
        Ok(())
    }

    /// Pretty JSON encoding used for JSON artifacts
    pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec_pretty(value).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    /// Serialize `value` as pretty JSON and write it atomically
    pub fn write_json<T: Serialize>(&self, kind: ArtifactKind, value: &T) -> Result<(), StorageError> {
        self.write(kind, &Self::encode_json(value)?)
    }

    /// Read and decode a JSON artifact
    pub fn read_json<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T, StorageError> {
        let bytes = self.read(kind)?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Write `bytes` to a synced temp file next to `path`, returning the temp path
fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let tmp = temp_path(path);
    if let Err(e) = write_and_sync(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    debug!("Staged {}", tmp.display());
    Ok(tmp)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = fs::File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(bytes).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
