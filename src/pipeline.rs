//! End-to-end batch scoring: normalize, extract features, score, assemble.

use crate::assembler::ResultAssembler;
use crate::config::DetectionConfig;
use crate::error::ScoringError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::scorer::AnomalyScorer;
use crate::normalizer::{json_type_name, Normalizer};
use crate::types::request::ScoringOverrides;
use crate::types::scored::{BatchOutcome, ScoredTransaction};
use crate::types::transaction::Transaction;
use serde_json::Value;
use tracing::{debug, info};

/// Batch scoring entry point.
///
/// Holds only immutable configuration; every call builds its own ensemble
/// and random generator, so one pipeline can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct ScoringPipeline {
    detection: DetectionConfig,
    normalizer: Normalizer,
    assembler: ResultAssembler,
}

impl ScoringPipeline {
    /// Create a pipeline with default detection parameters for every call
    pub fn new(detection: DetectionConfig) -> Self {
        Self {
            detection,
            normalizer: Normalizer::new(),
            assembler: ResultAssembler::new(),
        }
    }

    /// Default detection parameters
    pub fn detection(&self) -> &DetectionConfig {
        &self.detection
    }

    /// Parameters for one call after applying overrides
    pub fn effective_params(&self, overrides: &ScoringOverrides) -> DetectionConfig {
        DetectionConfig {
            contamination: overrides
                .contamination
                .unwrap_or(self.detection.contamination),
            random_seed: overrides.random_seed.unwrap_or(self.detection.random_seed),
            ..self.detection
        }
    }

    /// Score a batch with the default parameters
    pub fn score_batch(&self, raw: &[Value]) -> Result<BatchOutcome, ScoringError> {
        self.score_batch_with(raw, &ScoringOverrides::default())
    }

    /// Score a batch of raw records.
    ///
    /// Non-object records are dropped and counted; rows that cannot be merged
    /// back are excluded and counted. Any failure while building or running
    /// the ensemble fails the whole batch.
    pub fn score_batch_with(
        &self,
        raw: &[Value],
        overrides: &ScoringOverrides,
    ) -> Result<BatchOutcome, ScoringError> {
        let params = self.effective_params(overrides);
        params.validate()?;

        let normalized = self.normalizer.normalize_batch(raw);
        let matrix = FeatureExtractor::new().extract_batch(normalized.transactions());

        if matrix.is_empty() {
            debug!(
                dropped = normalized.dropped_count(),
                "No valid transactions, skipping scorer"
            );
            return Ok(
                BatchOutcome::new(Vec::new(), params.contamination, params.random_seed)
                    .with_drops(normalized.dropped_count(), 0),
            );
        }

        let results = AnomalyScorer::new(params).score(&matrix)?;
        let assembled = self.assembler.assemble(&normalized.records, &results);

        let outcome = BatchOutcome::new(
            assembled.transactions,
            params.contamination,
            params.random_seed,
        )
        .with_drops(normalized.dropped_count(), assembled.excluded.len());

        info!(
            batch_id = %outcome.batch_id,
            rows = outcome.len(),
            flagged = outcome.flagged,
            dropped = outcome.dropped_records,
            unmerged = outcome.unmerged_rows,
            contamination = params.contamination,
            random_seed = params.random_seed,
            "Batch scored"
        );

        Ok(outcome)
    }

    /// Score typed transactions; extra fields are carried into the output.
    pub fn score_transactions(
        &self,
        transactions: &[Transaction],
        overrides: &ScoringOverrides,
    ) -> Result<BatchOutcome, ScoringError> {
        // serde_json writes NaN and infinities as null, which would score as 0.0
        let matrix = FeatureExtractor::new().extract_batch(transactions);
        if let Some((row, feature)) = matrix.first_non_finite() {
            return Err(ScoringError::Scoring(format!(
                "non-finite value {} at row {} feature {}",
                matrix.get(row, feature),
                row,
                feature
            )));
        }

        let raw = transactions
            .iter()
            .enumerate()
            .map(|(index, tx)| {
                serde_json::to_value(tx).map_err(|e| ScoringError::Assembly {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.score_batch_with(&raw, overrides)
    }

    /// Score exactly one record outside of a batch.
    ///
    /// A lone record cannot be ranked, so it always takes the
    /// insufficient-data path and comes back unflagged.
    pub fn score_single(
        &self,
        raw: &Value,
        overrides: &ScoringOverrides,
    ) -> Result<ScoredTransaction, ScoringError> {
        if !raw.is_object() {
            return Err(ScoringError::MalformedRecord {
                index: 0,
                found: json_type_name(raw),
            });
        }

        let outcome = self.score_batch_with(std::slice::from_ref(raw), overrides)?;
        outcome
            .transactions
            .into_iter()
            .next()
            .ok_or_else(|| ScoringError::Assembly {
                index: 0,
                reason: "scored record could not be assembled".to_string(),
            })
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
