//! Test Transaction Producer
//!
//! Generates batches of synthetic banking transactions, sends them to the
//! scoring service over NATS and logs the flagged rows.
//!
//! Usage: test_producer [nats_url] [subject] [batches] [batch_size] [outlier_rate] [delay_ms]

use chrono::{Duration as ChronoDuration, Utc};
use fraud_scoring_pipeline::{
    BatchOutcome, ScoringOverrides, ScoringPipeline, ScoringResponse, Transaction,
};
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Fields shared by every generated transaction
    fn base(&mut self, amount: f64, merchant: &str, category: &[&str]) -> Transaction {
        self.transaction_counter += 1;
        let when = Utc::now() - ChronoDuration::minutes(self.rng.gen_range(0..43_200));

        Transaction::new((amount * 100.0).round() / 100.0, merchant)
            .with_date(when.format("%Y-%m-%d").to_string())
            .with_category(category.iter().map(|c| c.to_string()).collect())
            .with_payment_channel(self.random_choice(&["online", "in store", "other"]))
            .with_extra(
                "transaction_id",
                json!(format!("tx_{:012}", self.transaction_counter)),
            )
            .with_extra(
                "account_id",
                json!(format!("acc_{}", self.rng.gen_range(1..20))),
            )
            .with_extra("iso_currency_code", json!("USD"))
            .with_extra("authorized_datetime", json!(when.to_rfc3339()))
    }

    /// Generate an everyday purchase
    fn generate_legitimate(&mut self) -> Transaction {
        let amount = self.rng.gen_range(5.0..150.0);
        let merchant = self.random_choice(&["Starbucks", "Uber", "Whole Foods", "Shell", "Netflix"]);
        let category = match merchant {
            "Starbucks" => ["Food and Drink", "Coffee Shop"],
            "Uber" => ["Travel", "Taxi"],
            "Whole Foods" => ["Shops", "Supermarkets and Groceries"],
            "Shell" => ["Travel", "Gas Stations"],
            _ => ["Service", "Subscription"],
        };
        let mut tx = self.base(amount, merchant, &category);
        tx.location.insert("city".to_string(), json!("San Francisco"));
        tx.location.insert("region".to_string(), json!("CA"));
        tx
    }

    /// Generate an unusually large transaction
    fn generate_outlier(&mut self) -> Transaction {
        let amount = self.rng.gen_range(5_000.0..50_000.0);
        let merchant = self.random_choice(&["Luxury Watches Intl", "Wire Transfer", "Crypto Exchange"]);
        let mut tx = self.base(amount, merchant, &["Transfer", "Wire"]);
        tx.pending = self.rng.gen_bool(0.5);
        tx
    }

    fn generate_batch(&mut self, size: usize, outlier_rate: f64) -> (Vec<Transaction>, usize) {
        let mut outliers = 0;
        let batch = (0..size)
            .map(|_| {
                if self.rng.gen_bool(outlier_rate) {
                    outliers += 1;
                    self.generate_outlier()
                } else {
                    self.generate_legitimate()
                }
            })
            .collect();
        (batch, outliers)
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

/// Outlier probability from the command line, clamped to [0, 1]
fn parse_outlier_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .map(|rate| rate.clamp(0.0, 1.0))
        .unwrap_or(0.05)
}

fn log_outcome(batch: u64, outcome: &BatchOutcome, generated_outliers: usize) {
    info!(
        batch = batch,
        batch_id = %outcome.batch_id,
        rows = outcome.len(),
        flagged = outcome.flagged,
        generated_outliers = generated_outliers,
        "Batch scored"
    );
    for tx in outcome.flagged_transactions() {
        info!(
            transaction_id = %tx.get("transaction_id").cloned().unwrap_or_default(),
            merchant = %tx.get("merchant_name").cloned().unwrap_or_default(),
            amount = tx.amount().unwrap_or_default(),
            fraud_score = tx.fraud_score,
            "Flagged transaction"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions.batch");
    let batches: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let batch_size: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(50);
    let outlier_rate = parse_outlier_rate(args.get(5).map(|s| s.as_str()));
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        batches = batches,
        batch_size = batch_size,
        outlier_rate = outlier_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(batches, batch_size, outlier_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();

    for i in 0..batches {
        let (batch, outliers) = generator.generate_batch(batch_size, outlier_rate);
        let payload = serde_json::to_vec(&json!({ "transactions": batch }))?;

        let reply = client.request(subject.to_string(), payload.into()).await?;
        match serde_json::from_slice::<ScoringResponse>(&reply.payload)? {
            ScoringResponse::Ok(outcome) => log_outcome(i + 1, &outcome, outliers),
            ScoringResponse::Error { kind, message } => {
                warn!(batch = i + 1, kind = %kind, message = %message, "Scoring failed")
            }
            ScoringResponse::Scored { .. } => warn!("Unexpected single-record reply"),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Sent {} batches of {} transactions", batches, batch_size);

    Ok(())
}

async fn run_dry_mode(
    batches: u64,
    batch_size: usize,
    outlier_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (scoring locally)");

    let mut generator = TransactionGenerator::new();
    let pipeline = ScoringPipeline::default();

    for i in 0..batches {
        let (batch, outliers) = generator.generate_batch(batch_size, outlier_rate);

        if i == 0 {
            if let Some(sample) = batch.first() {
                info!("Sample transaction:\n{}", serde_json::to_string_pretty(sample)?);
            }
        }

        let outcome = pipeline.score_transactions(&batch, &ScoringOverrides::default())?;
        log_outcome(i + 1, &outcome, outliers);

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outlier_rate() {
        assert_eq!(parse_outlier_rate(None), 0.05);
        assert_eq!(parse_outlier_rate(Some("0.2")), 0.2);
        assert_eq!(parse_outlier_rate(Some("1.5")), 1.0);
        assert_eq!(parse_outlier_rate(Some("-3")), 0.0);
        assert_eq!(parse_outlier_rate(Some("NaN")), 0.05);
        assert_eq!(parse_outlier_rate(Some("lots")), 0.05);
    }

    #[test]
    fn test_generate_batch_with_extreme_rates() {
        let mut generator = TransactionGenerator::new();

        let (batch, outliers) = generator.generate_batch(10, parse_outlier_rate(Some("7")));
        assert_eq!(batch.len(), 10);
        assert_eq!(outliers, 10);

        let (_, outliers) = generator.generate_batch(10, parse_outlier_rate(Some("-1")));
        assert_eq!(outliers, 0);
    }
}
