//! Deterministic train/test split

use crate::TrainingError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Pick the rows of `items` named by `indices`
    pub fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
        indices.iter().map(|&i| items[i].clone()).collect()
    }
}

/// Shuffle `0..n` with a seeded RNG; the first `ceil(n * test_ratio)` form the test set
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> Result<Split, TrainingError> {
    let test_len = (n as f64 * test_ratio).ceil() as usize;
    if test_len == 0 || test_len >= n {
        return Err(TrainingError::Aborted(format!(
            "cannot split {n} rows with test ratio {test_ratio}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(test_len);
    Ok(Split {
        train,
        test: indices,
    })
}
