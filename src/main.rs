//! Fraud Scoring Pipeline - Main Entry Point
//!
//! Receives transaction batches and ad hoc single-transaction requests from
//! NATS, scores them with the Isolation Forest pipeline and replies with the
//! scored records.

use anyhow::{Context, Result};
use fraud_scoring_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::{IncomingRequest, TransactionConsumer},
    metrics::{MetricsReporter, PipelineMetrics},
    pipeline::ScoringPipeline,
    producer::ResultProducer,
    types::ScoringResponse,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("fraud_scoring_pipeline={}", logging.level)),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if logging.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Block until every spawned request has released its permit, so in-flight
/// batches still get their reply before the process exits.
async fn wait_for_in_flight(semaphore: &Semaphore, workers: usize) {
    let in_flight = workers.saturating_sub(semaphore.available_permits());
    if in_flight > 0 {
        info!(in_flight = in_flight, "Waiting for in-flight requests");
    }
    match semaphore.acquire_many(workers as u32).await {
        Ok(permits) => permits.forget(),
        Err(e) => warn!(error = %e, "Could not wait for in-flight requests"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (optional path as first argument)
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;

    info!("Starting Fraud Scoring Pipeline");
    info!(
        contamination = config.detection.contamination,
        random_seed = config.detection.random_seed,
        n_estimators = config.detection.n_estimators,
        max_samples = config.detection.max_samples,
        "Detection parameters loaded"
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Arc::new(ScoringPipeline::new(config.detection));

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(
        client.clone(),
        &config.nats.batch_subject,
        &config.nats.single_subject,
    );
    let producer = Arc::new(ResultProducer::new(
        client.clone(),
        &config.nats.result_subject,
    ));

    let num_workers = config.pipeline.workers;
    info!(
        "Starting request loop with {} parallel workers, default results to {}",
        num_workers,
        producer.subject()
    );

    // Semaphore to limit concurrent scoring
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let metrics_clone = metrics.clone();
    let interval = config.pipeline.summary_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, interval);
        reporter.start().await;
    });

    let mut requests = consumer.subscribe().await?;

    loop {
        let (kind, message) = tokio::select! {
            next = requests.next() => match next {
                Some(request) => request,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let response = match IncomingRequest::decode(kind, &message.payload) {
                Ok(IncomingRequest::Batch(request)) => {
                    let (records, overrides) = request.into_parts();
                    match pipeline.score_batch_with(&records, &overrides) {
                        Ok(outcome) => {
                            let processing_time = start_time.elapsed();
                            metrics.record_batch(&outcome, processing_time);
                            debug!(
                                batch_id = %outcome.batch_id,
                                processing_time_us = processing_time.as_micros(),
                                "Batch request complete"
                            );
                            ScoringResponse::Ok(outcome)
                        }
                        Err(e) => {
                            error!(error = %e, records = records.len(), "Batch scoring failed");
                            metrics.record_failure(e.kind());
                            ScoringResponse::from(&e)
                        }
                    }
                }
                Ok(IncomingRequest::Single(request)) => {
                    match pipeline.score_single(&request.transaction, &request.overrides) {
                        Ok(transaction) => {
                            metrics.record_single(transaction.is_fraudulent, start_time.elapsed());
                            ScoringResponse::Scored { transaction }
                        }
                        Err(e) => {
                            warn!(error = %e, "Single transaction scoring failed");
                            metrics.record_failure(e.kind());
                            ScoringResponse::from(&e)
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, subject = %message.subject, "Failed to decode request");
                    metrics.record_failure("invalid_request");
                    ScoringResponse::invalid_request(e.to_string())
                }
            };

            if let Err(e) = producer.publish(message.reply.clone(), &response).await {
                error!(error = %e, "Failed to publish scoring response");
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    wait_for_in_flight(&semaphore, num_workers).await;

    // Print final summary
    metrics.print_summary();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_requests() {
        let semaphore = Arc::new(Semaphore::new(2));
        let finished = Arc::new(AtomicBool::new(false));

        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let done = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            done.store(true, Ordering::SeqCst);
            drop(permit);
        });

        wait_for_in_flight(&semaphore, 2).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_with_nothing_in_flight() {
        let semaphore = Semaphore::new(3);
        wait_for_in_flight(&semaphore, 3).await;
        assert_eq!(semaphore.available_permits(), 0);
    }
}
