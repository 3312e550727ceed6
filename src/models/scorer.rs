//! Batch anomaly scorer: fits a seeded Isolation Forest over a feature
//! matrix and turns raw scores into contamination-based decisions.

use crate::config::DetectionConfig;
use crate::error::ScoringError;
use crate::feature_extractor::FeatureMatrix;
use crate::models::isolation_forest::IsolationForest;
use crate::types::scored::AnomalyResult;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Fewest rows for which an outlier ranking is attempted
pub const MIN_ROWS_FOR_SCORING: usize = 2;

/// Decision boundary derived from a batch's raw scores
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    /// Raw score subtracted from every row to center decisions on zero
    pub offset: f64,
    /// Whether each row, in input order, is among the flagged rows
    pub flagged: Vec<bool>,
}

impl Threshold {
    /// Flag the `round(contamination * n)` lowest raw scores.
    ///
    /// Rows are ranked by raw score ascending; equal scores rank by input
    /// position so the earliest rows are flagged first. The offset sits
    /// halfway between the last flagged and the first unflagged score.
    pub fn from_scores(scores: &[f64], contamination: f64) -> Self {
        let n = scores.len();
        if n == 0 {
            return Self {
                offset: 0.0,
                flagged: Vec::new(),
            };
        }

        let k = outlier_count(n, contamination);

        let mut ranked: Vec<usize> = (0..n).collect();
        ranked.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

        let offset = match k {
            0 => scores[ranked[0]],
            k if k == n => scores[ranked[n - 1]],
            k => (scores[ranked[k - 1]] + scores[ranked[k]]) / 2.0,
        };

        let mut flagged = vec![false; n];
        for &row in &ranked[..k] {
            flagged[row] = true;
        }

        Self { offset, flagged }
    }

    /// Number of flagged rows
    pub fn flagged_count(&self) -> usize {
        self.flagged.iter().filter(|&&f| f).count()
    }
}

/// Number of rows to flag in a batch of `n`
pub fn outlier_count(n: usize, contamination: f64) -> usize {
    ((contamination * n as f64).round() as usize).min(n)
}

/// Scores feature matrices with a freshly seeded ensemble per call.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    params: DetectionConfig,
}

impl AnomalyScorer {
    pub fn new(params: DetectionConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectionConfig {
        &self.params
    }

    /// Score every row of `matrix`, in row order.
    ///
    /// Batches with fewer than [`MIN_ROWS_FOR_SCORING`] rows are not
    /// partitioned; every row is reported as normal.
    pub fn score(&self, matrix: &FeatureMatrix) -> Result<Vec<AnomalyResult>, ScoringError> {
        self.params.validate()?;

        if matrix.is_empty() {
            return Ok(Vec::new());
        }

        if let Some((row, feature)) = matrix.first_non_finite() {
            return Err(ScoringError::Scoring(format!(
                "non-finite value {} at row {} feature {}",
                matrix.get(row, feature),
                row,
                feature
            )));
        }

        if matrix.n_rows() < MIN_ROWS_FOR_SCORING {
            debug!(
                rows = matrix.n_rows(),
                "Too few rows to partition, assuming normal"
            );
            return Ok(vec![AnomalyResult::assumed_normal(); matrix.n_rows()]);
        }

        let mut rng = StdRng::seed_from_u64(self.params.random_seed);
        let mut forest = IsolationForest::new(self.params.n_estimators, self.params.max_samples);
        forest.fit(matrix, &mut rng)?;

        let raw_scores = forest.score_samples(matrix);
        let threshold = Threshold::from_scores(&raw_scores, self.params.contamination);

        debug!(
            rows = matrix.n_rows(),
            flagged = threshold.flagged_count(),
            offset = threshold.offset,
            "Batch scored"
        );

        Ok(raw_scores
            .iter()
            .zip(&threshold.flagged)
            .map(|(&score, &is_fraudulent)| AnomalyResult {
                fraud_score: score - threshold.offset,
                is_fraudulent,
            })
            .collect())
    }
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
