//! Train on a CSV, then serve predictions from the persisted artifacts.

use inference_engine::{HealthStatus, InferenceConfig, InferenceEngine, PredictionResponse};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::path::Path;
use storage::{ArtifactPaths, ArtifactStore};
use training::{TrainingConfig, TrainingPipeline};

const CELLS: usize = 21;

fn healthy_pack() -> Vec<f64> {
    vec![
        3.486, 3.507, 3.524, 3.481, 3.495, 3.478, 3.502, 3.489, 3.511, 3.476, 3.498, 3.484,
        3.493, 3.505, 3.480, 3.490, 3.497, 3.482, 3.500, 3.487, 3.492,
    ]
}

/// 200 packs whose SOH (0.60..0.98) rises with pack voltage, plus one sparse
/// row, one row with a missing cell and one row with a faulty cell reading.
fn write_training_csv(path: &Path) {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut csv = String::new();

    let header: Vec<String> = (1..=CELLS).map(|i| format!("U{i}")).collect();
    writeln!(csv, "{},SOH,Temp", header.join(",")).unwrap();

    for i in 0..200 {
        let t: f64 = rng.gen_range(0.0..1.0);
        let base = 3.40 + 0.15 * t;
        let soh = 0.60 + 0.38 * t;
        let mut cells: Vec<String> = (0..CELLS)
            .map(|_| format!("{:.4}", base + rng.gen_range(-0.025..0.025)))
            .collect();
        if i == 10 {
            cells[2] = "NA".to_string();
        }
        if i == 20 {
            cells[4] = "5.5000".to_string();
        }
        writeln!(csv, "{},{:.4},25.0", cells.join(","), soh).unwrap();
    }

    let sparse: Vec<&str> = (0..CELLS).map(|c| if c < 3 { "3.45" } else { "NA" }).collect();
    writeln!(csv, "{},0.75,", sparse.join(",")).unwrap();

    std::fs::write(path, csv).unwrap();
}

fn train(dir: &Path) -> training::TrainingReport {
    let data_path = dir.join("packs.csv");
    write_training_csv(&data_path);

    let config = TrainingConfig {
        data_path,
        artifacts: ArtifactPaths::in_dir(dir.join("artifacts")),
        ..Default::default()
    };
    TrainingPipeline::new(config).unwrap().run().unwrap()
}

#[test]
fn test_train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let report = train(dir.path());

    assert_eq!(report.cleaning.rows_loaded, 201);
    assert_eq!(report.cleaning.rows_dropped_sparse, 1);
    assert_eq!(report.cleaning.values_imputed, 1);
    assert_eq!(report.cleaning.rows_dropped_outliers, 1);
    assert_eq!(report.train_rows + report.test_rows, 199);
    assert_eq!(report.test_rows, 40);
    assert!(report.metrics.r2 > 0.8, "{:?}", report.metrics);

    // No label below the threshold, yet degraded probes still move the output
    assert_eq!(report.labels.below_threshold, 0);
    assert!(report.probe_span() >= 0.1);
    assert!(report.coverage.min_prediction() < 0.6);

    let store = ArtifactStore::in_dir(dir.path().join("artifacts"));
    let engine = InferenceEngine::new(store, InferenceConfig::default()).unwrap();

    let result = engine.predict(&healthy_pack()).unwrap();
    assert_eq!(result.health_status, HealthStatus::Healthy);
    assert!(result.soh >= 0.6, "{result:?}");
    assert!(result.soh <= 1.0);

    let degraded: Vec<f64> = healthy_pack().iter().map(|v| v * 0.85).collect();
    let result = engine.predict(&degraded).unwrap();
    assert_eq!(result.health_status, HealthStatus::Problem);

    match engine.respond(&healthy_pack()[..18]) {
        PredictionResponse::Error { error } => assert!(error.contains("21"), "{error}"),
        other => panic!("expected an error response, got {other:?}"),
    }
}

#[test]
fn test_retraining_replaces_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let first = train(dir.path());
    let second = train(dir.path());
    assert_eq!(first.metrics.r2, second.metrics.r2);

    let names: Vec<String> = std::fs::read_dir(dir.path().join("artifacts"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 3, "{names:?}");
}

#[test]
fn test_missing_data_file_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        data_path: dir.path().join("absent.csv"),
        artifacts: ArtifactPaths::in_dir(dir.path()),
        ..Default::default()
    };
    assert!(TrainingPipeline::new(config).unwrap().run().is_err());
    assert!(!ArtifactStore::in_dir(dir.path()).exists(storage::ArtifactKind::Model));
}
