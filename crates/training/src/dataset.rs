//! Raw measurement loading and cleaning

use crate::settings::TrainingConfig;
use crate::TrainingError;
use csv::{ReaderBuilder, StringRecord, Trim};
use data_validator::{MedianImputer, OutlierFilter, ValidationError, Validator};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Field values treated as missing rather than as text
pub const MISSING_MARKERS: [&str; 5] = ["", "NA", "NaN", "nan", "null"];

/// Row counts at each cleaning stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub rows_loaded: usize,
    pub rows_dropped_sparse: usize,
    pub values_imputed: usize,
    pub rows_dropped_outliers: usize,
    pub rows_dropped_label: usize,
}

/// Cleaned per-cell voltages with their SOH labels
#[derive(Debug, Clone)]
pub struct Dataset {
    pub voltages: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    pub stats: CleaningStats,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

enum Field {
    Present(f64),
    Missing,
    Text,
}

fn classify(raw: &str) -> Field {
    if MISSING_MARKERS.contains(&raw) {
        return Field::Missing;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Field::Present(v),
        _ => Field::Text,
    }
}

/// Reads the training table and applies the cleaning stages in order:
/// sparse-row drop, median imputation, voltage outlier removal, label range check.
pub struct DatasetLoader<'a> {
    config: &'a TrainingConfig,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(config: &'a TrainingConfig) -> Self {
        Self { config }
    }

    /// Load and clean the CSV at `path`
    pub fn load(&self, path: &Path) -> Result<Dataset, TrainingError> {
        info!("Loading training data from {}", path.display());
        let file = File::open(path).map_err(|e| {
            TrainingError::Aborted(format!("cannot open {}: {}", path.display(), e))
        })?;
        self.read_from(file)
    }

    /// Load and clean CSV content from any reader
    pub fn read_from<R: Read>(&self, reader: R) -> Result<Dataset, TrainingError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let names = self.required_columns();
        let indices = column_indices(&headers, &names)?;

        let mut stats = CleaningStats::default();
        let mut partial: Vec<Vec<Option<f64>>> = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            stats.rows_loaded += 1;

            let present = record
                .iter()
                .filter(|raw| matches!(classify(raw), Field::Present(_)))
                .count();
            if present < self.config.min_non_missing_fields {
                stats.rows_dropped_sparse += 1;
                continue;
            }

            partial.push(required_values(&record, row, &names, &indices)?);
        }

        if stats.rows_dropped_sparse > 0 {
            info!(
                "Dropped {} rows with fewer than {} numeric fields",
                stats.rows_dropped_sparse, self.config.min_non_missing_fields
            );
        }
        if partial.is_empty() {
            return Err(TrainingError::Aborted(format!(
                "no usable rows out of {} loaded",
                stats.rows_loaded
            )));
        }

        let imputer = MedianImputer::fit(&partial, &names)?;
        let (rows, filled) = imputer.apply(partial)?;
        stats.values_imputed = filled;
        if filled > 0 {
            info!("Imputed {} missing values with column medians", filled);
        }

        let cells = self.config.cell_count;
        let voltage_columns: Vec<usize> = (0..cells).collect();
        let filter = OutlierFilter::new(self.config.outlier_z_threshold)?;
        let keep = filter.keep_mask(&rows, &voltage_columns)?;
        stats.rows_dropped_outliers = keep.iter().filter(|k| !**k).count();
        if stats.rows_dropped_outliers > 0 {
            info!(
                "Dropped {} outlier rows (|z| >= {})",
                stats.rows_dropped_outliers,
                filter.threshold()
            );
        }

        let validator = Validator::with_cell_count(cells)?;
        let mut voltages = Vec::with_capacity(rows.len());
        let mut labels = Vec::with_capacity(rows.len());
        for (mut row, _) in rows.into_iter().zip(keep).filter(|(_, k)| *k) {
            let label = row[cells];
            if let Err(e) = validator.validate_soh(label) {
                warn!("Dropping row: {}", e);
                stats.rows_dropped_label += 1;
                continue;
            }
            row.truncate(cells);
            voltages.push(row);
            labels.push(label);
        }

        if labels.len() < self.config.min_rows {
            return Err(TrainingError::Aborted(format!(
                "only {} rows remain after cleaning, need at least {}",
                labels.len(),
                self.config.min_rows
            )));
        }

        info!(
            "Dataset ready: {} of {} rows kept",
            labels.len(),
            stats.rows_loaded
        );
        Ok(Dataset {
            voltages,
            labels,
            stats,
        })
    }

    /// Voltage columns followed by the label column
    fn required_columns(&self) -> Vec<String> {
        let mut names = self.config.voltage_columns();
        names.push(self.config.label_column.clone());
        names
    }
}

fn column_indices(headers: &StringRecord, names: &[String]) -> Result<Vec<usize>, TrainingError> {
    names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ValidationError::MissingField(name.clone()).into())
        })
        .collect()
}

fn required_values(
    record: &StringRecord,
    row: usize,
    names: &[String],
    indices: &[usize],
) -> Result<Vec<Option<f64>>, TrainingError> {
    names
        .iter()
        .zip(indices)
        .map(|(name, &idx)| match classify(record.get(idx).unwrap_or("")) {
            Field::Present(v) => Ok(Some(v)),
            Field::Missing => Ok(None),
            Field::Text => {
                let raw = record.get(idx).unwrap_or_default();
                debug!("Row {} column {} holds text {:?}", row, name, raw);
                Err(ValidationError::InvalidFormat(format!(
                    "row {row}: column {name} has non-numeric value {raw:?}"
                ))
                .into())
            }
        })
        .collect()
}
