//! Fraud Scoring Pipeline Library
//!
//! Batch anomaly scoring for banking transactions: records are normalized,
//! reduced to a feature matrix, scored with a seeded Isolation Forest and
//! merged back into portable JSON output.

pub mod assembler;
pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod producer;
pub mod types;

pub use config::{AppConfig, DetectionConfig};
pub use consumer::TransactionConsumer;
pub use error::ScoringError;
pub use feature_extractor::{FeatureExtractor, FeatureMatrix};
pub use models::{AnomalyScorer, IsolationForest};
pub use normalizer::Normalizer;
pub use pipeline::ScoringPipeline;
pub use producer::ResultProducer;
pub use types::{
    AnomalyResult, BatchOutcome, ScoredTransaction, ScoringOverrides, ScoringResponse,
    Transaction,
};
