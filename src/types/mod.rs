//! Type definitions for the fraud scoring pipeline

pub mod request;
pub mod scored;
pub mod transaction;

pub use request::{BatchRequest, ScoringOverrides, ScoringResponse, SingleRequest};
pub use scored::{AnomalyResult, BatchOutcome, ScoredTransaction};
pub use transaction::Transaction;
