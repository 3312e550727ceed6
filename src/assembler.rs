//! Merges original records with their anomaly results.

use crate::error::ScoringError;
use crate::normalizer::NormalizedRecord;
use crate::types::scored::{AnomalyResult, ScoredTransaction};
use serde_json::{Map, Number, Value};
use tracing::warn;

/// Output of assembling one batch
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    /// Successfully merged rows, in input order
    pub transactions: Vec<ScoredTransaction>,
    /// Input positions of rows that could not be merged
    pub excluded: Vec<usize>,
}

/// Zips normalized records with scorer output by position.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Merge every record with its result. A row that fails to merge is
    /// excluded and logged; the others are still returned.
    pub fn assemble(&self, records: &[NormalizedRecord], results: &[AnomalyResult]) -> Assembled {
        let mut assembled = Assembled {
            transactions: Vec::with_capacity(records.len()),
            excluded: Vec::new(),
        };

        for (record, result) in records.iter().zip(results) {
            match self.merge(record.index, &record.source, result) {
                Ok(scored) => assembled.transactions.push(scored),
                Err(e) => {
                    warn!(index = record.index, error = %e, "Excluding unmergeable row");
                    assembled.excluded.push(record.index);
                }
            }
        }

        // Results never outnumber records, but a short result list must not
        // silently lose rows either.
        for record in records.iter().skip(results.len()) {
            warn!(index = record.index, "Excluding row without a score");
            assembled.excluded.push(record.index);
        }

        assembled
    }

    /// Merge one record with its result.
    ///
    /// Every original field is kept as-is; `fraud_score` and
    /// `is_fraudulent` replace any same-named input fields.
    pub fn merge(
        &self,
        index: usize,
        source: &Map<String, Value>,
        result: &AnomalyResult,
    ) -> Result<ScoredTransaction, ScoringError> {
        // serde_json would silently write a non-finite float as null
        if Number::from_f64(result.fraud_score).is_none() {
            return Err(ScoringError::Assembly {
                index,
                reason: format!("fraud_score {} is not a finite number", result.fraud_score),
            });
        }

        let mut fields = source.clone();
        fields.remove("fraud_score");
        fields.remove("is_fraudulent");

        Ok(ScoredTransaction {
            fields,
            fraud_score: result.fraud_score,
            is_fraudulent: result.is_fraudulent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Normalizer;
    use serde_json::json;

    fn records(raw: Vec<Value>) -> Vec<NormalizedRecord> {
        Normalizer::new().normalize_batch(&raw).records
    }

    #[test]
    fn test_merge_keeps_all_fields() {
        let raw = json!({
            "amount": 10,
            "merchant_name": "Shop",
            "account_id": "acc_1",
            "location": {"city": "Austin"}
        });
        let recs = records(vec![raw.clone()]);
        let result = AnomalyResult {
            fraud_score: -0.05,
            is_fraudulent: true,
        };

        let assembled = ResultAssembler::new().assemble(&recs, &[result]);
        assert!(assembled.excluded.is_empty());

        let out = serde_json::to_value(&assembled.transactions[0]).unwrap();
        let mut expected = raw.as_object().unwrap().clone();
        expected.insert("fraud_score".to_string(), json!(-0.05));
        expected.insert("is_fraudulent".to_string(), json!(true));
        assert_eq!(out, Value::Object(expected));
    }

    #[test]
    fn test_existing_score_fields_overwritten() {
        let recs = records(vec![json!({"amount": 1, "fraud_score": "stale"})]);
        let assembled = ResultAssembler::new().assemble(&recs, &[AnomalyResult::assumed_normal()]);

        let out = serde_json::to_value(&assembled.transactions[0]).unwrap();
        assert_eq!(out["fraud_score"], json!(0.0));
        assert_eq!(out["is_fraudulent"], json!(false));
    }

    #[test]
    fn test_non_finite_score_is_excluded() {
        let recs = records(vec![json!({"amount": 1}), json!({"amount": 2})]);
        let results = [
            AnomalyResult {
                fraud_score: f64::NAN,
                is_fraudulent: false,
            },
            AnomalyResult {
                fraud_score: 0.1,
                is_fraudulent: false,
            },
        ];

        let assembled = ResultAssembler::new().assemble(&recs, &results);
        assert_eq!(assembled.excluded, vec![0]);
        assert_eq!(assembled.transactions.len(), 1);
        assert_eq!(assembled.transactions[0].amount(), Some(2.0));
    }

    #[test]
    fn test_missing_results_are_excluded() {
        let recs = records(vec![json!({"amount": 1}), json!({"amount": 2})]);
        let assembled = ResultAssembler::new().assemble(&recs, &[AnomalyResult::assumed_normal()]);

        assert_eq!(assembled.transactions.len(), 1);
        assert_eq!(assembled.excluded, vec![1]);
    }
}
