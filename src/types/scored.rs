//! Scored output structures handed to the presentation layer

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-row output of the Isolation Forest scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Score relative to the contamination threshold; negative means anomalous
    pub fraud_score: f64,
    /// Whether the row falls in the flagged contamination fraction
    pub is_fraudulent: bool,
}

impl AnomalyResult {
    /// Result used when a batch is too small to partition
    pub fn assumed_normal() -> Self {
        Self {
            fraud_score: 0.0,
            is_fraudulent: false,
        }
    }
}

/// An input record with its anomaly result merged in.
///
/// `fields` holds every field of the original record exactly as received,
/// so the serialized form is the original object plus `fraud_score` and
/// `is_fraudulent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub fraud_score: f64,
    pub is_fraudulent: bool,
}

impl ScoredTransaction {
    /// Look up an original field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Amount as it appeared on the original record, if numeric
    pub fn amount(&self) -> Option<f64> {
        self.fields.get("amount").and_then(Value::as_f64)
    }
}

/// Successful result of scoring one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Unique identifier of this invocation
    pub batch_id: String,

    /// Completion time, RFC 3339 in UTC
    pub scored_at: String,

    /// Contamination fraction used for thresholding
    pub contamination: f64,

    /// Seed used for tree construction
    pub random_seed: u64,

    /// Scored rows in input order
    pub transactions: Vec<ScoredTransaction>,

    /// Input records that were not JSON objects
    pub dropped_records: usize,

    /// Scored rows that could not be merged back into output
    pub unmerged_rows: usize,

    /// Number of rows with `is_fraudulent = true`
    pub flagged: usize,
}

impl BatchOutcome {
    /// Build an outcome stamped with a fresh id and the current time
    pub fn new(
        transactions: Vec<ScoredTransaction>,
        contamination: f64,
        random_seed: u64,
    ) -> Self {
        let flagged = transactions.iter().filter(|t| t.is_fraudulent).count();
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            scored_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            contamination,
            random_seed,
            transactions,
            dropped_records: 0,
            unmerged_rows: 0,
            flagged,
        }
    }

    /// Record drop counts from the normalizer and assembler
    pub fn with_drops(mut self, dropped_records: usize, unmerged_rows: usize) -> Self {
        self.dropped_records = dropped_records;
        self.unmerged_rows = unmerged_rows;
        self
    }

    /// Number of scored rows
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Iterate over flagged rows only
    pub fn flagged_transactions(&self) -> impl Iterator<Item = &ScoredTransaction> {
        self.transactions.iter().filter(|t| t.is_fraudulent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scored(amount: f64, flagged: bool) -> ScoredTransaction {
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(amount));
        fields.insert("merchant_name".to_string(), json!("Shop"));
        ScoredTransaction {
            fields,
            fraud_score: if flagged { -0.1 } else { 0.1 },
            is_fraudulent: flagged,
        }
    }

    #[test]
    fn test_scored_transaction_flattens() {
        let value = serde_json::to_value(scored(12.0, true)).unwrap();
        assert_eq!(
            value,
            json!({
                "amount": 12.0,
                "merchant_name": "Shop",
                "fraud_score": -0.1,
                "is_fraudulent": true
            })
        );
    }

    #[test]
    fn test_batch_outcome_counts() {
        let outcome = BatchOutcome::new(vec![scored(1.0, false), scored(900.0, true)], 0.1, 42)
            .with_drops(1, 0);

        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.flagged, 1);
        assert_eq!(outcome.dropped_records, 1);
        assert_eq!(outcome.flagged_transactions().count(), 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.scored_at).is_ok());
        assert!(uuid::Uuid::parse_str(&outcome.batch_id).is_ok());
    }
}
