//! Data Validation and Normalization
//!
//! Provides voltage validation, dataset cleaning (median imputation, z-score
//! outlier removal) and the feature scaler used by both training and inference.

mod error;
mod filter;
mod imputer;
mod scaler;
pub mod stats;
mod validator;

pub use error::ValidationError;
pub use filter::{OutlierFilter, DEFAULT_Z_THRESHOLD};
pub use imputer::MedianImputer;
pub use scaler::Scaler;
pub use validator::{ensure_finite, ValidationConfig, Validator, DEFAULT_CELL_COUNT};
