//! Training Pipeline Implementation

use crate::coverage::{CoverageCheck, CoverageReport, LabelSummary};
use crate::dataset::{CleaningStats, Dataset, DatasetLoader};
use crate::settings::TrainingConfig;
use crate::split::{train_test_split, Split};
use crate::TrainingError;
use data_validator::Scaler;
use feature_engine::FeatureExtractor;
use inference_engine::{ModelMetrics, RegressionModel};
use serde::Serialize;
use std::time::Instant;
use storage::{ArtifactKind, ArtifactStore};
use tracing::{info, warn};

/// Outcome of a completed training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub metrics: ModelMetrics,
    #[serde(flatten)]
    pub cleaning: CleaningStats,
    pub train_rows: usize,
    pub test_rows: usize,
    pub labels: LabelSummary,
    pub coverage: CoverageReport,
}

impl TrainingReport {
    /// Span of the degraded-probe predictions
    pub fn probe_span(&self) -> f64 {
        self.coverage.span
    }
}

/// One-shot offline training run
pub struct TrainingPipeline {
    config: TrainingConfig,
    store: ArtifactStore,
    extractor: FeatureExtractor,
}

impl TrainingPipeline {
    /// Create a pipeline persisting to the configured artifact paths
    pub fn new(config: TrainingConfig) -> Result<Self, TrainingError> {
        let store = ArtifactStore::new(config.artifacts.clone());
        Self::with_store(config, store)
    }

    /// Create a pipeline persisting to an explicit store
    pub fn with_store(config: TrainingConfig, store: ArtifactStore) -> Result<Self, TrainingError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.cell_count)?;
        Ok(Self {
            config,
            store,
            extractor,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the configured data file and train on it
    pub fn run(&self) -> Result<TrainingReport, TrainingError> {
        let dataset = DatasetLoader::new(&self.config).load(&self.config.data_path)?;
        self.run_on(dataset)
    }

    /// Train on an already cleaned dataset
    ///
    /// Artifacts are written only after every check has passed; an error at any
    /// earlier step leaves the store untouched.
    pub fn run_on(&self, dataset: Dataset) -> Result<TrainingReport, TrainingError> {
        let labels = LabelSummary::from_labels(&dataset.labels, self.config.health_threshold);
        info!(
            "SOH labels: n={} min={:.4} max={:.4} mean={:.4}, {} below {}",
            labels.count,
            labels.min,
            labels.max,
            labels.mean,
            labels.below_threshold,
            self.config.health_threshold
        );
        if labels.below_threshold == 0 {
            warn!(
                "No training label is below {}; the model may not recognize degraded packs",
                self.config.health_threshold
            );
        }

        let features: Vec<Vec<f64>> = self
            .extractor
            .extract_batch(&dataset.voltages)?
            .into_iter()
            .map(|f| f.values)
            .collect();

        let split = train_test_split(dataset.len(), self.config.test_ratio, self.config.seed)?;
        let train_x = Split::select(&features, &split.train);
        let train_y = Split::select(&dataset.labels, &split.train);
        let test_x = Split::select(&features, &split.test);
        let test_y = Split::select(&dataset.labels, &split.test);
        info!("Split: {} train / {} test rows", train_x.len(), test_x.len());

        let scaler = Scaler::fit(&train_x)?;
        let train_x = scaler.transform_batch(&train_x)?;
        let test_x = scaler.transform_batch(&test_x)?;

        let start = Instant::now();
        let model = RegressionModel::fit_with(&train_x, &train_y, self.config.rank_policy)?;
        let train_time_s = start.elapsed().as_secs_f64();

        let metrics = model.evaluate(&test_x, &test_y)?.with_train_time(train_time_s);
        info!(
            "Evaluation: r2={:.4} mse={:.6} mae={:.6} ({:.3}s fit)",
            metrics.r2, metrics.mse, metrics.mae, metrics.train_time_s
        );

        let coverage = CoverageCheck::new(&self.config.coverage).run(
            &dataset.voltages,
            &self.extractor,
            &scaler,
            &model,
        )?;

        self.store.write_all(&[
            (ArtifactKind::Scaler, scaler.to_bytes()?),
            (ArtifactKind::Model, model.to_bytes()?),
            (ArtifactKind::Metrics, ArtifactStore::encode_json(&metrics)?),
        ])?;
        info!("Training complete");

        Ok(TrainingReport {
            metrics,
            cleaning: dataset.stats,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            labels,
            coverage,
        })
    }
}
