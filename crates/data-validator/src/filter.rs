//! Z-score Outlier Filter

use crate::error::ValidationError;
use crate::stats::{mean, population_std};
use tracing::debug;

/// Default |z| at which a sample is treated as an outlier
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Sample-level outlier filter over a set of columns
///
/// A row is rejected when any of the selected columns has |z| >= threshold,
/// with z computed against that column's mean and population std over all rows.
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    threshold: f64,
}

impl OutlierFilter {
    /// Create a new filter with given |z| threshold
    pub fn new(threshold: f64) -> Result<Self, ValidationError> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ValidationError::InvalidConfig(format!(
                "outlier z threshold must be positive, got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    /// The |z| threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compute a keep-mask for `rows`, looking only at `columns`
    ///
    /// A column with zero spread gives z = 0 for every row.
    pub fn keep_mask(
        &self,
        rows: &[Vec<f64>],
        columns: &[usize],
    ) -> Result<Vec<bool>, ValidationError> {
        let mut keep = vec![true; rows.len()];
        if rows.is_empty() {
            return Ok(keep);
        }

        for &col in columns {
            let values = rows
                .iter()
                .map(|row| {
                    row.get(col).copied().ok_or(ValidationError::ShapeMismatch {
                        expected: col + 1,
                        actual: row.len(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;

            let m = mean(&values);
            let std = population_std(&values, m);
            if std == 0.0 {
                continue;
            }

            for (i, v) in values.iter().enumerate() {
                if ((v - m) / std).abs() >= self.threshold {
                    keep[i] = false;
                }
            }
        }

        debug!(
            "Outlier filter: {} of {} rows kept",
            keep.iter().filter(|k| **k).count(),
            rows.len()
        );
        Ok(keep)
    }

    /// Remove outlier rows, returning the survivors and the number dropped
    pub fn apply<T>(
        &self,
        items: Vec<T>,
        rows: &[Vec<f64>],
        columns: &[usize],
    ) -> Result<(Vec<T>, usize), ValidationError> {
        if items.len() != rows.len() {
            return Err(ValidationError::ShapeMismatch {
                expected: rows.len(),
                actual: items.len(),
            });
        }
        let keep = self.keep_mask(rows, columns)?;
        let before = items.len();
        let kept: Vec<T> = items
            .into_iter()
            .zip(keep)
            .filter_map(|(item, k)| k.then_some(item))
            .collect();
        let dropped = before - kept.len();
        Ok((kept, dropped))
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_rows(values: &[f64]) -> Vec<Vec<f64>> {
        values.iter().map(|v| vec![*v, 1.0]).collect()
    }

    #[test]
    fn test_drops_spike() {
        // 20 tight values and one spike: the spike's z is well above 3
        let mut values = vec![3.5; 20];
        for (i, v) in values.iter_mut().enumerate() {
            *v += (i % 3) as f64 * 0.01;
        }
        values.push(9.0);
        let rows = column_rows(&values);

        let filter = OutlierFilter::default();
        let keep = filter.keep_mask(&rows, &[0]).unwrap();
        assert!(!keep[20]);
        assert_eq!(keep.iter().filter(|k| **k).count(), 20);
    }

    #[test]
    fn test_constant_column_keeps_everything() {
        let rows = column_rows(&[3.7; 10]);
        let keep = OutlierFilter::default().keep_mask(&rows, &[0, 1]).unwrap();
        assert!(keep.iter().all(|k| *k));
    }

    #[test]
    fn test_only_selected_columns_count() {
        let mut rows = column_rows(&[3.5; 20]);
        rows.push(vec![3.5, 1000.0]);
        // Column 1 holds the spike but only column 0 is checked
        let keep = OutlierFilter::default().keep_mask(&rows, &[0]).unwrap();
        assert!(keep.iter().all(|k| *k));
    }

    #[test]
    fn test_apply_returns_dropped_count() {
        let mut values = vec![1.0; 30];
        values[0] = 1.1;
        values.push(50.0);
        let rows = column_rows(&values);
        let ids: Vec<usize> = (0..rows.len()).collect();

        let (kept, dropped) = OutlierFilter::default().apply(ids, &rows, &[0]).unwrap();
        assert_eq!(dropped, 1);
        assert!(!kept.contains(&30));
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(OutlierFilter::new(0.0).is_err());
        assert!(OutlierFilter::new(f64::NAN).is_err());
    }
}
