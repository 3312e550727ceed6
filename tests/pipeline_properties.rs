//! End-to-end behavior of the batch scoring pipeline.

use fraud_scoring_pipeline::{ScoringOverrides, ScoringPipeline};
use proptest::prelude::*;
use serde_json::{json, Value};

fn batch(amounts: &[f64]) -> Vec<Value> {
    amounts.iter().map(|a| json!({ "amount": a })).collect()
}

fn flagged_amounts(raw: &[Value], overrides: &ScoringOverrides) -> Vec<f64> {
    ScoringPipeline::default()
        .score_batch_with(raw, overrides)
        .unwrap()
        .flagged_transactions()
        .filter_map(|t| t.amount())
        .collect()
}

#[test]
fn four_row_example_flags_the_large_amount() {
    let raw = batch(&[10.0, 12.0, 9.0, 5000.0]);
    let overrides = ScoringOverrides::default().with_contamination(0.25);

    assert_eq!(flagged_amounts(&raw, &overrides), vec![5000.0]);
}

#[test]
fn clustered_batch_flags_the_outlier() {
    let mut amounts: Vec<f64> = (0..20).map(|i| 50.0 + ((i % 7) as f64 - 3.0) * 0.5).collect();
    amounts[13] = 100_000.0;

    let outcome = ScoringPipeline::default()
        .score_batch(&batch(&amounts))
        .unwrap();

    assert_eq!(outcome.flagged, 2);
    assert!(outcome.transactions[13].is_fraudulent);
    assert!(outcome.transactions[13].fraud_score < 0.0);
    // The outlier has the lowest score in the batch
    let lowest = outcome
        .transactions
        .iter()
        .map(|t| t.fraud_score)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(outcome.transactions[13].fraud_score, lowest);
}

#[test]
fn empty_batch_yields_empty_outcome() {
    let outcome = ScoringPipeline::default().score_batch(&[]).unwrap();
    assert!(outcome.is_empty());
    assert_eq!(outcome.flagged, 0);
    assert_eq!(outcome.dropped_records, 0);
}

#[test]
fn single_row_batch_is_not_flagged() {
    let outcome = ScoringPipeline::default()
        .score_batch(&batch(&[1_000_000.0]))
        .unwrap();
    assert_eq!(outcome.len(), 1);
    assert!(!outcome.transactions[0].is_fraudulent);
}

#[test]
fn all_fields_round_trip() {
    let raw = vec![
        json!({
            "amount": 12.5,
            "date": "2024-02-11",
            "merchant_name": "Cafe",
            "category": ["Food and Drink"],
            "location": {"city": "Denver", "postal_code": null},
            "payment_channel": "in store",
            "pending": false,
            "transaction_id": "t-1",
            "counterparties": [{"name": "Cafe", "type": "merchant"}]
        }),
        json!({"amount": "13", "account_owner": null}),
        json!({"transaction_id": "t-3"}),
    ];

    let outcome = ScoringPipeline::default().score_batch(&raw).unwrap();
    assert_eq!(outcome.len(), raw.len());

    for (input, scored) in raw.iter().zip(&outcome.transactions) {
        let mut output = serde_json::to_value(scored).unwrap();
        let output = output.as_object_mut().unwrap();
        assert!(output.remove("fraud_score").unwrap().is_number());
        assert!(output.remove("is_fraudulent").unwrap().is_boolean());
        assert_eq!(&Value::Object(output.clone()), input);
    }
}

#[test]
fn malformed_records_are_dropped_and_counted() {
    let raw = vec![
        json!({"amount": 10}),
        Value::Null,
        json!({"amount": 11}),
        json!("garbage"),
        json!({"amount": 12}),
    ];

    let outcome = ScoringPipeline::default().score_batch(&raw).unwrap();
    assert_eq!(outcome.dropped_records, 2);
    let amounts: Vec<f64> = outcome.transactions.iter().filter_map(|t| t.amount()).collect();
    assert_eq!(amounts, vec![10.0, 11.0, 12.0]);
}

#[test]
fn identical_amounts_flag_earliest_rows() {
    let raw = batch(&[7.0; 10]);
    let overrides = ScoringOverrides::default().with_contamination(0.2);
    let outcome = ScoringPipeline::default()
        .score_batch_with(&raw, &overrides)
        .unwrap();

    let flags: Vec<bool> = outcome.transactions.iter().map(|t| t.is_fraudulent).collect();
    assert_eq!(
        flags,
        vec![true, true, false, false, false, false, false, false, false, false]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn flagged_count_matches_contamination(
        amounts in prop::collection::vec(0.0f64..10_000.0, 2..80),
        contamination in 0.01f64..=0.5,
    ) {
        let overrides = ScoringOverrides::default().with_contamination(contamination);
        let outcome = ScoringPipeline::default()
            .score_batch_with(&batch(&amounts), &overrides)
            .unwrap();

        let expected = (contamination * amounts.len() as f64).round() as usize;
        prop_assert_eq!(outcome.flagged, expected);
        prop_assert_eq!(outcome.flagged_transactions().count(), expected);
    }

    #[test]
    fn scoring_is_deterministic_and_order_preserving(
        amounts in prop::collection::vec(-500.0f64..500.0, 2..60),
        seed in 0u64..1_000,
    ) {
        let raw = batch(&amounts);
        let overrides = ScoringOverrides::default().with_random_seed(seed);
        let pipeline = ScoringPipeline::default();

        let first = pipeline.score_batch_with(&raw, &overrides).unwrap();
        let second = pipeline.score_batch_with(&raw, &overrides).unwrap();

        prop_assert_eq!(first.len(), amounts.len());
        for ((a, b), amount) in first.transactions.iter().zip(&second.transactions).zip(&amounts) {
            prop_assert_eq!(a.fraud_score.to_bits(), b.fraud_score.to_bits());
            prop_assert_eq!(a.is_fraudulent, b.is_fraudulent);
            prop_assert_eq!(a.amount(), Some(*amount));
        }
    }
}
