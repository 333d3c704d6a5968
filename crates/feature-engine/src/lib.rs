//! Feature Engineering Engine
//!
//! Derives the fixed 6-value aggregate feature vector (mean, median, std, min,
//! max, skew) from a pack's per-cell voltages.

mod features;
mod statistics;

pub use features::{FeatureExtractor, FeatureVector, FEATURE_DIMENSION, FEATURE_NAMES};
pub use statistics::StatisticalFeatures;
