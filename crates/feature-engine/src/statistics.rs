//! Statistical Features Computation

use data_validator::stats::median;

/// Aggregate statistics of one pack's voltage sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticalFeatures {
    /// Mean value
    pub mean: f64,
    /// Median value
    pub median: f64,
    /// Sample standard deviation (divisor n - 1)
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Skewness (asymmetry), third standardized moment
    pub skewness: f64,
}

impl StatisticalFeatures {
    /// Compute statistical features from a slice of values
    ///
    /// Callers validate length and finiteness; an empty slice yields all zeros.
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;

        // Mean
        let mean = values.iter().sum::<f64>() / n;

        // Min/Max
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        // All-equal values: the rounded mean may sit an ulp away from them,
        // which would otherwise leak a tiny spread and a skew of ±1
        if min == max {
            return Self {
                mean: min,
                median: min,
                std_dev: 0.0,
                min,
                max,
                skewness: 0.0,
            };
        }

        // Central moments
        let mut m2 = 0.0;
        let mut m3 = 0.0;
        for &v in values {
            let d = v - mean;
            m2 += d * d;
            m3 += d * d * d;
        }

        let std_dev = if values.len() > 1 {
            (m2 / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        // Skewness: E[(X-μ)³] / σ³ with population σ
        let population_variance = m2 / n;
        let skewness = if population_variance > 0.0 {
            (m3 / n) / population_variance.powf(1.5)
        } else {
            0.0
        };

        Self {
            mean,
            median: median(values).unwrap_or(mean),
            std_dev,
            min,
            max,
            skewness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_computation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = StatisticalFeatures::compute(&values);
        assert!((stats.mean - 3.0).abs() < 0.001);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
    }

    #[test]
    fn test_sample_std_dev() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let stats = StatisticalFeatures::compute(&values);
        // Σ(x-5)² = 32, 32 / 7
        assert!((stats.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_values_have_zero_skew() {
        let stats = StatisticalFeatures::compute(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(stats.skewness.abs() < 1e-12);
    }

    #[test]
    fn test_skew_sign() {
        // Long right tail
        let right = StatisticalFeatures::compute(&[1.0, 1.0, 1.0, 1.0, 10.0]);
        assert!(right.skewness > 0.0);
        let left = StatisticalFeatures::compute(&[10.0, 10.0, 10.0, 10.0, 1.0]);
        assert!(left.skewness < 0.0);
        assert!((right.skewness + left.skewness).abs() < 1e-12);
    }

    #[test]
    fn test_constant_values() {
        let stats = StatisticalFeatures::compute(&[3.7; 21]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.skewness, 0.0);
        assert!(!stats.skewness.is_nan());
    }

    #[test]
    fn test_empty_values() {
        let values: Vec<f64> = vec![];
        let stats = StatisticalFeatures::compute(&values);
        assert_eq!(stats.mean, 0.0);
    }
}
