//! Label coverage summary and the degraded-probe check

use crate::settings::CoverageConfig;
use crate::TrainingError;
use data_validator::stats::{mean, median};
use data_validator::Scaler;
use feature_engine::FeatureExtractor;
use inference_engine::RegressionModel;
use serde::Serialize;
use tracing::{info, warn};

/// Distribution of the SOH labels a model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Labels strictly below the health threshold
    pub below_threshold: usize,
}

impl LabelSummary {
    pub fn from_labels(labels: &[f64], threshold: f64) -> Self {
        if labels.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                below_threshold: 0,
            };
        }
        Self {
            count: labels.len(),
            min: labels.iter().copied().fold(f64::INFINITY, f64::min),
            max: labels.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: mean(labels),
            below_threshold: labels.iter().filter(|l| **l < threshold).count(),
        }
    }
}

/// Predictions for the probe packs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub scales: Vec<f64>,
    pub predictions: Vec<f64>,
    /// max - min over `predictions`
    pub span: f64,
}

impl CoverageReport {
    /// Lowest probe prediction
    pub fn min_prediction(&self) -> f64 {
        self.predictions.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Scores uniformly degraded versions of a typical pack
///
/// A model trained only on healthy labels tends to predict a near-constant
/// healthy SOH. Feeding it the per-cell median pack scaled down by each probe
/// factor shows whether its output moves at all.
pub struct CoverageCheck<'a> {
    config: &'a CoverageConfig,
}

impl<'a> CoverageCheck<'a> {
    pub fn new(config: &'a CoverageConfig) -> Self {
        Self { config }
    }

    /// Per-cell median of `voltages`, scaled by each probe factor
    pub fn probe_packs(&self, voltages: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, TrainingError> {
        let cells = voltages.first().map(Vec::len).unwrap_or(0);
        let mut base = Vec::with_capacity(cells);
        for cell in 0..cells {
            let column: Vec<f64> = voltages.iter().map(|row| row[cell]).collect();
            let m = median(&column)
                .ok_or_else(|| TrainingError::Aborted("no voltages to build probes from".into()))?;
            base.push(m);
        }
        if base.is_empty() {
            return Err(TrainingError::Aborted("no voltages to build probes from".into()));
        }

        Ok(self
            .config
            .probe_scales
            .iter()
            .map(|scale| base.iter().map(|v| v * scale).collect())
            .collect())
    }

    /// Score the probes through the inference path and enforce the minimum span
    pub fn run(
        &self,
        voltages: &[Vec<f64>],
        extractor: &FeatureExtractor,
        scaler: &Scaler,
        model: &RegressionModel,
    ) -> Result<CoverageReport, TrainingError> {
        let mut predictions = Vec::with_capacity(self.config.probe_scales.len());
        for probe in self.probe_packs(voltages)? {
            let features = extractor.extract(&probe)?;
            let scaled = scaler.transform(features.as_slice())?;
            predictions.push(model.predict(&scaled)?);
        }

        let max = predictions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = predictions.iter().copied().fold(f64::INFINITY, f64::min);
        let report = CoverageReport {
            scales: self.config.probe_scales.clone(),
            predictions,
            span: max - min,
        };

        for (scale, soh) in report.scales.iter().zip(&report.predictions) {
            info!("Probe x{:.2}: predicted SOH {:.4}", scale, soh);
        }

        if report.span < self.config.min_prediction_span {
            warn!(
                "Probe predictions span {:.4}, below the required {:.4}",
                report.span, self.config.min_prediction_span
            );
            return Err(TrainingError::Aborted(format!(
                "model predictions span only {:.4} across degraded probes (need {:.4}); \
                 training data likely lacks low-SOH samples",
                report.span, self.config.min_prediction_span
            )));
        }
        Ok(report)
    }
}
