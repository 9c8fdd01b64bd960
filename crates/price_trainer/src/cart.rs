//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression trees over second-order gradient statistics.
//! Every distinct value of every feature is a split candidate; candidates
//! are scanned over per-node presorted columns so each level costs one pass
//! over the samples per feature.

use carprice_core::gbdt::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty added to every hessian sum
    pub l2_regularization: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 20,
            l2_regularization: 0.0,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: f64, gain: f64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Sample indices of one feature column, ascending by value
///
/// Ties are ordered by sample index so the order is fully determined.
pub fn presort_columns(features: &[Vec<f64>], feature_count: usize) -> Vec<Vec<usize>> {
    (0..feature_count)
        .map(|f| {
            let mut order: Vec<usize> = (0..features.len()).collect();
            order.sort_by(|&a, &b| {
                features[a][f]
                    .total_cmp(&features[b][f])
                    .then_with(|| a.cmp(&b))
            });
            order
        })
        .collect()
}

/// Build a regression tree using exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    /// `features`, `gradients` and `hessians` must have the same length
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map_or(0, Vec::len);
        Self {
            config,
            features,
            gradients,
            hessians,
            feature_count,
        }
    }

    /// Build a tree over the samples listed in `presorted`
    ///
    /// `presorted[f]` holds the participating sample indices ordered by
    /// feature `f`, normally from [`presort_columns`]. Leaf values are the
    /// unshrunk Newton steps `-G / (H + lambda)`.
    pub fn build(&self, presorted: &[Vec<usize>]) -> Tree {
        let mut nodes = Vec::new();
        let mut goes_left = vec![false; self.features.len()];
        let columns = presorted.to_vec();
        self.build_node(columns, 0, 0, &mut nodes, &mut goes_left);
        Tree::new(nodes)
    }

    /// Recursively build tree nodes, returning the index of the new node
    fn build_node(
        &self,
        columns: Vec<Vec<usize>>,
        depth: usize,
        node_id: usize,
        nodes: &mut Vec<Node>,
        goes_left: &mut [bool],
    ) -> i32 {
        let current_idx = nodes.len();
        let samples: &[usize] = columns.first().map_or(&[], Vec::as_slice);
        let (sum_g, sum_h) = self.sum_gradients_hessians(samples);
        let leaf_value = self.leaf_value(sum_g, sum_h);

        if depth >= self.config.max_depth || samples.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            nodes.push(Node::leaf(current_idx as i32, leaf_value));
            return current_idx as i32;
        }

        let split = match self.find_best_split(&columns, sum_g, sum_h, node_id) {
            Some(s) => s,
            None => {
                nodes.push(Node::leaf(current_idx as i32, leaf_value));
                return current_idx as i32;
            }
        };

        for &idx in samples {
            goes_left[idx] = self.features[idx][split.feature_idx] <= split.threshold;
        }
        let (left_columns, right_columns) = partition_columns(columns, goes_left);

        // Reserve the slot; children are patched in after recursion
        nodes.push(Node::internal(
            current_idx as i32,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(left_columns, depth + 1, node_id * 2 + 1, nodes, goes_left);
        let right_idx = self.build_node(right_columns, depth + 1, node_id * 2 + 2, nodes, goes_left);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;
        current_idx as i32
    }

    /// Scan every feature's sorted column for the split with the best gain
    fn find_best_split(
        &self,
        columns: &[Vec<usize>],
        sum_g: f64,
        sum_h: f64,
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let lambda = self.config.l2_regularization;
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent_score = score(sum_g, sum_h, lambda);
        let mut best_split: Option<SplitCandidate> = None;

        for feature_idx in 0..self.feature_count {
            let column = &columns[feature_idx];
            let n = column.len();
            let mut g_left = 0.0;
            let mut h_left = 0.0;

            for pos in 0..n.saturating_sub(1) {
                let idx = column[pos];
                g_left += self.gradients[idx];
                h_left += self.hessians[idx];

                let left_count = pos + 1;
                if left_count < min_leaf || n - left_count < min_leaf {
                    continue;
                }

                let value = self.features[idx][feature_idx];
                let next_value = self.features[column[pos + 1]][feature_idx];
                if value == next_value {
                    continue;
                }

                let g_right = sum_g - g_left;
                let h_right = sum_h - h_left;
                let gain = score(g_left, h_left, lambda) + score(g_right, h_right, lambda)
                    - parent_score;
                if !(gain > 0.0) {
                    continue;
                }

                let threshold = midpoint(value, next_value);
                let candidate = SplitCandidate::new(feature_idx, threshold, gain, node_id);
                best_split = match best_split {
                    Some(current) if !candidate.beats(&current) => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        best_split
    }

    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &idx| {
            (g + self.gradients[idx], h + self.hessians[idx])
        })
    }

    /// Optimal leaf value: -G / (H + lambda)
    fn leaf_value(&self, sum_g: f64, sum_h: f64) -> f64 {
        let denom = sum_h + self.config.l2_regularization;
        if denom <= 0.0 {
            return 0.0;
        }
        -sum_g / denom
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 {
        g * g / denom
    } else {
        0.0
    }
}

/// Threshold between two adjacent distinct values; `value <= t < next`
fn midpoint(value: f64, next: f64) -> f64 {
    let mid = value + (next - value) / 2.0;
    if mid < next {
        mid
    } else {
        value
    }
}

fn partition_columns(
    columns: Vec<Vec<usize>>,
    goes_left: &[bool],
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let mut left = Vec::with_capacity(columns.len());
    let mut right = Vec::with_capacity(columns.len());
    for column in columns {
        let (l, r): (Vec<usize>, Vec<usize>) = column.into_iter().partition(|&i| goes_left[i]);
        left.push(l);
        right.push(r);
    }
    (left, right)
}
