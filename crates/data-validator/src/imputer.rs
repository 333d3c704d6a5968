//! Median imputation of missing numeric fields

use crate::error::ValidationError;
use crate::stats::median;
use tracing::debug;

/// Per-column medians used to fill missing values
#[derive(Debug, Clone)]
pub struct MedianImputer {
    medians: Vec<f64>,
}

impl MedianImputer {
    /// Learn column medians from the present values of `rows`
    ///
    /// `names` labels the columns for error messages. Every column must have at
    /// least one present value.
    pub fn fit(rows: &[Vec<Option<f64>>], names: &[String]) -> Result<Self, ValidationError> {
        if rows.is_empty() {
            return Err(ValidationError::EmptyDataset);
        }

        let mut medians = Vec::with_capacity(names.len());
        for (col, name) in names.iter().enumerate() {
            let mut present = Vec::with_capacity(rows.len());
            for row in rows {
                match row.get(col) {
                    Some(Some(v)) => present.push(*v),
                    Some(None) => {}
                    None => {
                        return Err(ValidationError::ShapeMismatch {
                            expected: names.len(),
                            actual: row.len(),
                        })
                    }
                }
            }
            let m = median(&present).ok_or_else(|| {
                ValidationError::InvalidFormat(format!(
                    "column {name} has no numeric values to impute from"
                ))
            })?;
            medians.push(m);
        }

        Ok(Self { medians })
    }

    /// Learned medians, one per column
    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    /// Fill missing values, returning dense rows and the number of values filled
    pub fn apply(&self, rows: Vec<Vec<Option<f64>>>) -> Result<(Vec<Vec<f64>>, usize), ValidationError> {
        let mut filled = 0;
        let mut dense = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != self.medians.len() {
                return Err(ValidationError::ShapeMismatch {
                    expected: self.medians.len(),
                    actual: row.len(),
                });
            }
            let values = row
                .into_iter()
                .zip(&self.medians)
                .map(|(value, median)| {
                    value.unwrap_or_else(|| {
                        filled += 1;
                        *median
                    })
                })
                .collect();
            dense.push(values);
        }
        debug!("Imputed {} missing values", filled);
        Ok((dense, filled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("U{i}")).collect()
    }

    #[test]
    fn test_fills_with_column_median() {
        let rows = vec![
            vec![Some(1.0), Some(10.0)],
            vec![None, Some(20.0)],
            vec![Some(3.0), None],
            vec![Some(5.0), Some(40.0)],
        ];
        let imputer = MedianImputer::fit(&rows, &names(2)).unwrap();
        assert_eq!(imputer.medians(), &[3.0, 20.0]);

        let (dense, filled) = imputer.apply(rows).unwrap();
        assert_eq!(filled, 2);
        assert_eq!(dense[1][0], 3.0);
        assert_eq!(dense[2][1], 20.0);
        assert_eq!(dense[3], vec![5.0, 40.0]);
    }

    #[test]
    fn test_all_missing_column_fails() {
        let rows = vec![vec![Some(1.0), None], vec![Some(2.0), None]];
        let err = MedianImputer::fit(&rows, &names(2)).unwrap_err();
        assert!(err.to_string().contains("U2"));
    }

    #[test]
    fn test_empty_rows() {
        assert_eq!(
            MedianImputer::fit(&[], &names(2)).unwrap_err(),
            ValidationError::EmptyDataset
        );
    }
}
