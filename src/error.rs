//! Error taxonomy for batch scoring

use thiserror::Error;

/// Failures surfaced to the caller of a scoring invocation.
///
/// Record-level problems inside a batch (malformed records, rows that cannot
/// be merged back) are recovered locally and reported as counts on
/// [`crate::types::BatchOutcome`]; only the variants below reach the caller.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// A record that is not a JSON object. Only raised by single-record
    /// scoring, where dropping the record would leave nothing to return.
    #[error("malformed record at index {index}: expected a JSON object, got {found}")]
    MalformedRecord { index: usize, found: &'static str },

    /// Ensemble construction or scoring could not be trusted.
    #[error("scoring failed: {0}")]
    Scoring(String),

    /// Detection parameters out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A scored row could not be assembled into output.
    #[error("failed to assemble scored row {index}: {reason}")]
    Assembly { index: usize, reason: String },
}

impl ScoringError {
    /// Short machine-readable kind for wire responses
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::MalformedRecord { .. } => "malformed_record",
            ScoringError::Scoring(_) => "scoring_failure",
            ScoringError::InvalidConfig(_) => "invalid_config",
            ScoringError::Assembly { .. } => "assembly_failure",
        }
    }
}
