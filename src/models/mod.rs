//! Anomaly detection models

pub mod isolation_forest;
pub mod scorer;

pub use isolation_forest::{IsolationForest, IsolationTree};
pub use scorer::{AnomalyScorer, Threshold};
