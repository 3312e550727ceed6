//! Feature extraction for transaction anomaly scoring.
//!
//! Builds the numeric matrix the Isolation Forest runs over. Currently a
//! single column holding the transaction amount.

use crate::types::transaction::Transaction;

/// Row-major numeric feature table, one row per transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_features: usize,
}

impl FeatureMatrix {
    /// Build a matrix from rows of equal width
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let n_rows = rows.len();
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        debug_assert_eq!(data.len(), n_rows * n_features);
        Self {
            data,
            n_rows,
            n_features,
        }
    }

    /// An N×1 matrix from a single column
    pub fn from_column(column: Vec<f64>) -> Self {
        Self {
            n_rows: column.len(),
            n_features: 1,
            data: column,
        }
    }

    /// The "no data" matrix
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Borrow row `i`
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.n_features;
        &self.data[start..start + self.n_features]
    }

    /// Value at row `i`, column `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_features + j]
    }

    /// Iterate over rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.n_features.max(1))
    }

    /// First row and column holding a NaN or infinite value
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|pos| (pos / self.n_features, pos % self.n_features))
    }
}

/// Feature extractor that transforms transactions into model input features.
///
/// Features are extracted in the order reported by [`FeatureExtractor::feature_names`].
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract the feature vector for one transaction.
    pub fn extract(&self, tx: &Transaction) -> Vec<f64> {
        vec![tx.amount]
    }

    /// Build the feature matrix for a batch, preserving order.
    ///
    /// Returns [`FeatureMatrix::empty`] for an empty batch; callers check
    /// `is_empty` and skip scoring.
    pub fn extract_batch<'a, I>(&self, transactions: I) -> FeatureMatrix
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let column: Vec<f64> = transactions.into_iter().map(|tx| tx.amount).collect();
        if column.is_empty() {
            return FeatureMatrix::empty();
        }
        FeatureMatrix::from_column(column)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        1
    }

    /// Get feature names in column order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        vec!["amount"]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
