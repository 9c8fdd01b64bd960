//! Deterministic utilities for reproducible training
//!
//! LCG-based shuffling and a total order over split candidates, so the
//! same CSV and parameters always yield the same model.

use std::cmp::Ordering;
use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.wrapping_abs() % Self::MODULUS),
        }
    }

    /// Next value in `[0, MODULUS)`
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Next value in `[0, max)`
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_i64() as u64 % max as u64) as usize
    }
}

/// Fisher-Yates permutation of `0..n` driven by [`LcgRng`]
pub fn shuffled_indices(n: usize, seed: i64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = LcgRng::new(seed);
    for i in (1..n).rev() {
        let j = rng.next_range(i + 1);
        indices.swap(i, j);
    }
    indices
}

/// Shuffle then cut off the last `test_fraction` of rows as the test set
///
/// The test set gets `ceil(n * test_fraction)` rows, and both sides keep at
/// least one row when `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: i64) -> (Vec<usize>, Vec<usize>) {
    let indices = shuffled_indices(n, seed);
    if n < 2 || test_fraction <= 0.0 {
        return (indices, Vec::new());
    }

    let test_len = ((n as f64) * test_fraction).ceil() as usize;
    let test_len = test_len.clamp(1, n - 1);
    let (train, test) = indices.split_at(n - test_len);
    (train.to_vec(), test.to_vec())
}

/// Deterministic tie-breaker for split selection
/// Orders by (feature_idx, threshold, node_id), thresholds by `total_cmp`
#[derive(Debug, Clone, Copy)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: f64,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: f64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            node_id,
        }
    }
}

impl PartialEq for SplitTieBreaker {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SplitTieBreaker {}

impl PartialOrd for SplitTieBreaker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SplitTieBreaker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.feature_idx
            .cmp(&other.feature_idx)
            .then_with(|| self.threshold.total_cmp(&other.threshold))
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}
