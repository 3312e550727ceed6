//! Wire formats exchanged with the transaction source and presentation layer

use crate::error::ScoringError;
use crate::types::scored::{BatchOutcome, ScoredTransaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-invocation parameter overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contamination: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
}

impl ScoringOverrides {
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = Some(contamination);
        self
    }

    pub fn with_random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = Some(random_seed);
        self
    }
}

/// A batch request: a bare array of records, or an envelope with overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchRequest {
    Bare(Vec<Value>),
    Envelope {
        transactions: Vec<Value>,
        #[serde(flatten)]
        overrides: ScoringOverrides,
    },
}

impl BatchRequest {
    /// Split into records and overrides
    pub fn into_parts(self) -> (Vec<Value>, ScoringOverrides) {
        match self {
            BatchRequest::Bare(transactions) => (transactions, ScoringOverrides::default()),
            BatchRequest::Envelope {
                transactions,
                overrides,
            } => (transactions, overrides),
        }
    }
}

/// An ad hoc request to score one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleRequest {
    pub transaction: Value,
    #[serde(flatten)]
    pub overrides: ScoringOverrides,
}

/// Reply sent back to the requester
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoringResponse {
    /// A scored batch
    Ok(BatchOutcome),
    /// A single scored transaction
    Scored { transaction: ScoredTransaction },
    /// The invocation failed as a whole
    Error { kind: String, message: String },
}

impl From<&ScoringError> for ScoringResponse {
    fn from(err: &ScoringError) -> Self {
        ScoringResponse::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl ScoringResponse {
    /// Error reply for a payload that could not be parsed at all
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ScoringResponse::Error {
            kind: "invalid_request".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_batch_request() {
        let request: BatchRequest = serde_json::from_value(json!([{"amount": 1}, null])).unwrap();
        let (records, overrides) = request.into_parts();
        assert_eq!(records.len(), 2);
        assert_eq!(overrides, ScoringOverrides::default());
    }

    #[test]
    fn test_envelope_batch_request() {
        let request: BatchRequest = serde_json::from_value(json!({
            "transactions": [{"amount": 1}],
            "contamination": 0.25,
            "random_seed": 7
        }))
        .unwrap();

        let (records, overrides) = request.into_parts();
        assert_eq!(records.len(), 1);
        assert_eq!(overrides.contamination, Some(0.25));
        assert_eq!(overrides.random_seed, Some(7));
    }

    #[test]
    fn test_single_request() {
        let request: SingleRequest =
            serde_json::from_value(json!({"transaction": {"amount": 5}})).unwrap();
        assert_eq!(request.transaction, json!({"amount": 5}));
        assert_eq!(request.overrides.contamination, None);
    }

    #[test]
    fn test_error_response() {
        let err = ScoringError::Scoring("bad row".to_string());
        let value = serde_json::to_value(ScoringResponse::from(&err)).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "error",
                "kind": "scoring_failure",
                "message": "scoring failed: bad row"
            })
        );
    }

    #[test]
    fn test_ok_response_is_flat() {
        let outcome = BatchOutcome::new(Vec::new(), 0.1, 42);
        let value = serde_json::to_value(ScoringResponse::Ok(outcome)).unwrap();
        assert_eq!(value["status"], json!("ok"));
        assert_eq!(value["transactions"], json!([]));
        assert_eq!(value["random_seed"], json!(42));
    }
}
