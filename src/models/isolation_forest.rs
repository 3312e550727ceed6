//! Isolation Forest ensemble.
//!
//! Anomalies are isolated by recursive random partitioning: points that sit
//! far from the bulk of the data need fewer splits to end up alone in a leaf,
//! so their average path length across the ensemble is shorter.
//!
//! All randomness comes from the caller-supplied generator, so a forest built
//! from the same matrix with the same seeded generator is identical.

use crate::error::ScoringError;
use crate::feature_extractor::FeatureMatrix;
use rand::Rng;
use tracing::debug;

/// Default number of trees
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Default sub-sampling size (following the original paper)
pub const DEFAULT_MAX_SAMPLES: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful BST search over `n` points.
///
/// Used both to normalize ensemble path lengths and to credit leaves that
/// still hold more than one point.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A node in an isolation tree
#[derive(Debug, Clone, PartialEq)]
pub enum IsolationNode {
    /// Rows with `row[feature] <= split_value` go left
    Internal {
        feature: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Rows left unseparated when splitting stopped
    Leaf { size: usize },
}

/// Single isolation tree
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Build a tree over the given rows of `matrix`.
    pub fn build<R: Rng>(
        matrix: &FeatureMatrix,
        rows: &[usize],
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            root: build_node(matrix, rows, 0, max_depth, rng),
        }
    }

    /// Edges from the root to the row's leaf, plus the leaf's size correction.
    pub fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Internal {
                    feature,
                    split_value,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *split_value {
                        &**left
                    } else {
                        &**right
                    };
                    depth += 1;
                }
                IsolationNode::Leaf { size } => {
                    return depth as f64 + average_path_length(*size);
                }
            }
        }
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        fn walk(node: &IsolationNode) -> usize {
            match node {
                IsolationNode::Internal { left, right, .. } => 1 + walk(left).max(walk(right)),
                IsolationNode::Leaf { .. } => 0,
            }
        }
        walk(&self.root)
    }

    pub fn root(&self) -> &IsolationNode {
        &self.root
    }
}

fn build_node<R: Rng>(
    matrix: &FeatureMatrix,
    rows: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut R,
) -> IsolationNode {
    if rows.len() <= 1 || depth >= max_depth {
        return IsolationNode::Leaf { size: rows.len() };
    }

    // Features that still vary among these rows, with their ranges
    let candidates: Vec<(usize, f64, f64)> = (0..matrix.n_features())
        .filter_map(|feature| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &r| {
                let v = matrix.get(r, feature);
                (acc.0.min(v), acc.1.max(v))
            });
            (min < max).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return IsolationNode::Leaf { size: rows.len() };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let split_value = draw_split(min, max, rng);

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&r| matrix.get(r, feature) <= split_value);

    IsolationNode::Internal {
        feature,
        split_value,
        left: Box::new(build_node(matrix, &left_rows, depth + 1, max_depth, rng)),
        right: Box::new(build_node(matrix, &right_rows, depth + 1, max_depth, rng)),
    }
}

/// Uniform split value in [min, max) for finite `min < max`.
///
/// The minimum always goes left and the maximum always goes right, so
/// neither side of the split is empty.
fn draw_split<R: Rng>(min: f64, max: f64, rng: &mut R) -> f64 {
    if (max - min).is_finite() {
        return rng.gen_range(min..max);
    }
    // Span overflows f64; interpolate instead of subtracting
    let u: f64 = rng.gen();
    let split = min * (1.0 - u) + max * u;
    if split < max {
        split.max(min)
    } else {
        min
    }
}

/// Isolation Forest - ensemble of isolation trees
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    n_estimators: usize,
    max_samples: usize,
    /// Subsample size actually used by the last fit
    subsample_size: usize,
}

impl IsolationForest {
    /// Create an unfitted forest
    pub fn new(n_estimators: usize, max_samples: usize) -> Self {
        Self {
            trees: Vec::with_capacity(n_estimators),
            n_estimators,
            max_samples,
            subsample_size: 0,
        }
    }

    /// Build the ensemble over `matrix`, replacing any previous fit.
    pub fn fit<R: Rng>(
        &mut self,
        matrix: &FeatureMatrix,
        rng: &mut R,
    ) -> Result<(), ScoringError> {
        if matrix.is_empty() || matrix.n_features() == 0 {
            return Err(ScoringError::Scoring(
                "cannot fit isolation forest on an empty feature matrix".to_string(),
            ));
        }
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(ScoringError::InvalidConfig(format!(
                "n_estimators ({}) and max_samples ({}) must be positive",
                self.n_estimators, self.max_samples
            )));
        }
        if let Some((row, feature)) = matrix.first_non_finite() {
            return Err(ScoringError::Scoring(format!(
                "non-finite value {} at row {} feature {}",
                matrix.get(row, feature),
                row,
                feature
            )));
        }

        let n_rows = matrix.n_rows();
        let subsample_size = self.max_samples.min(n_rows);
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        self.trees.clear();
        for _ in 0..self.n_estimators {
            let rows = rand::seq::index::sample(rng, n_rows, subsample_size).into_vec();
            self.trees
                .push(IsolationTree::build(matrix, &rows, max_depth, rng));
        }
        self.subsample_size = subsample_size;

        debug!(
            trees = self.trees.len(),
            subsample_size = subsample_size,
            max_depth = max_depth,
            "Isolation forest fitted"
        );

        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    /// Mean path length of `row` across the ensemble
    pub fn average_path(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Raw anomaly score in [-1, 0]; more negative means more anomalous.
    pub fn score_row(&self, row: &[f64]) -> f64 {
        let c = average_path_length(self.subsample_size);
        if c == 0.0 {
            // A one-row subsample cannot separate anything
            return -1.0;
        }
        -(2f64.powf(-self.average_path(row) / c))
    }

    /// Raw scores for every row of `matrix`, in row order
    pub fn score_samples(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        matrix.rows().map(|row| self.score_row(row)).collect()
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(DEFAULT_N_ESTIMATORS, DEFAULT_MAX_SAMPLES)
    }
}
