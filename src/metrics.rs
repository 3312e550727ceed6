//! Throughput and outcome statistics for the scoring service.

use crate::types::scored::BatchOutcome;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Batches scored successfully (single-record calls count as batches)
    pub batches_processed: AtomicU64,
    /// Rows returned with a score
    pub rows_scored: AtomicU64,
    /// Rows flagged as fraudulent
    pub rows_flagged: AtomicU64,
    /// Input records dropped as malformed
    pub records_dropped: AtomicU64,
    /// Scored rows excluded during assembly
    pub rows_unmerged: AtomicU64,
    /// Invocations that failed as a whole
    pub failures: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            batches_processed: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            rows_flagged: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            rows_unmerged: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored batch
    pub fn record_batch(&self, outcome: &BatchOutcome, processing_time: Duration) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.rows_scored
            .fetch_add(outcome.len() as u64, Ordering::Relaxed);
        self.rows_flagged
            .fetch_add(outcome.flagged as u64, Ordering::Relaxed);
        self.records_dropped
            .fetch_add(outcome.dropped_records as u64, Ordering::Relaxed);
        self.rows_unmerged
            .fetch_add(outcome.unmerged_rows as u64, Ordering::Relaxed);
        self.record_time(processing_time);
    }

    /// Record a single-record scoring call
    pub fn record_single(&self, flagged: bool, processing_time: Duration) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.rows_scored.fetch_add(1, Ordering::Relaxed);
        if flagged {
            self.rows_flagged.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time(processing_time);
    }

    /// Record an invocation that failed as a whole
    pub fn record_failure(&self, kind: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut times = match self.processing_times.read() {
            Ok(times) => times.clone(),
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }
        times.sort_unstable();

        let count = times.len();
        let percentile = |p: usize| times[(count * p / 100).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: times.iter().sum::<u64>() / count as u64,
            p50_us: percentile(50),
            p95_us: percentile(95),
            p99_us: percentile(99),
            max_us: times[count - 1],
        }
    }

    /// Rows scored per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Fraction of scored rows that were flagged
    pub fn get_flag_rate(&self) -> f64 {
        let scored = self.rows_scored.load(Ordering::Relaxed);
        if scored == 0 {
            return 0.0;
        }
        self.rows_flagged.load(Ordering::Relaxed) as f64 / scored as f64
    }

    /// Get failure counts by error kind
    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let batches = self.batches_processed.load(Ordering::Relaxed);
        let rows = self.rows_scored.load(Ordering::Relaxed);
        let flagged = self.rows_flagged.load(Ordering::Relaxed);
        let dropped = self.records_dropped.load(Ordering::Relaxed);
        let unmerged = self.rows_unmerged.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD SCORING PIPELINE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Batches: {:>8}  │  Rows: {:>8}  │  {:>8.1} rows/s    ║",
            batches,
            rows,
            self.get_throughput()
        );
        info!(
            "║ Flagged: {:>8}  │  Flag Rate: {:>6.1}%                    ║",
            flagged,
            self.get_flag_rate() * 100.0
        );
        info!(
            "║ Dropped: {:>8}  │  Unmerged: {:>6}  │  Failed: {:>6}    ║",
            dropped, unmerged, failures
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Batch Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╚══════════════════════════════════════════════════════════════╝");

        for (kind, count) in self.get_failures_by_kind() {
            info!("  failures[{}] = {}", kind, count);
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::scored::ScoredTransaction;
    use serde_json::Map;

    fn outcome(flags: &[bool]) -> BatchOutcome {
        let rows = flags
            .iter()
            .map(|&is_fraudulent| ScoredTransaction {
                fields: Map::new(),
                fraud_score: if is_fraudulent { -0.1 } else { 0.1 },
                is_fraudulent,
            })
            .collect();
        BatchOutcome::new(rows, 0.1, 42).with_drops(2, 1)
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_batch(&outcome(&[false, true, false, false]), Duration::from_micros(100));
        metrics.record_single(false, Duration::from_micros(300));

        assert_eq!(metrics.batches_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.rows_scored.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.rows_flagged.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.records_dropped.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.rows_unmerged.load(Ordering::Relaxed), 1);
        assert!((metrics.get_flag_rate() - 0.2).abs() < 1e-12);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_failure_recording() {
        let metrics = PipelineMetrics::new();
        metrics.record_failure("scoring_failure");
        metrics.record_failure("scoring_failure");
        metrics.record_failure("invalid_config");

        assert_eq!(metrics.failures.load(Ordering::Relaxed), 3);
        let by_kind = metrics.get_failures_by_kind();
        assert_eq!(by_kind.get("scoring_failure"), Some(&2));
        assert_eq!(by_kind.get("invalid_config"), Some(&1));
    }

    #[test]
    fn test_empty_stats() {
        let metrics = PipelineMetrics::new();
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(metrics.get_flag_rate(), 0.0);
    }
}
