//! Normalization of loosely-typed transaction records.
//!
//! Records arrive as arbitrary JSON. Any JSON object normalizes successfully
//! because every field has a safe default; only non-objects are dropped.

use crate::types::transaction::{Transaction, RECOGNIZED_FIELDS};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A normalized transaction paired with the record it came from
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    /// Position of the record in the input batch
    pub index: usize,
    /// Typed view used for feature extraction
    pub transaction: Transaction,
    /// Original record, untouched, used for output assembly
    pub source: Map<String, Value>,
}

/// Output of normalizing one batch
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Valid records in input order
    pub records: Vec<NormalizedRecord>,
    /// Input positions of records that were not JSON objects
    pub dropped: Vec<usize>,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of malformed records
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// Typed transactions in input order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.records.iter().map(|r| &r.transaction)
    }
}

/// Converts raw records into [`Transaction`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a batch, keeping input order and recording drops.
    pub fn normalize_batch(&self, raw: &[Value]) -> NormalizedBatch {
        let mut batch = NormalizedBatch {
            records: Vec::with_capacity(raw.len()),
            dropped: Vec::new(),
        };

        for (index, record) in raw.iter().enumerate() {
            match record.as_object() {
                Some(object) => batch.records.push(NormalizedRecord {
                    index,
                    transaction: self.normalize_object(object),
                    source: object.clone(),
                }),
                None => {
                    warn!(
                        index = index,
                        found = json_type_name(record),
                        "Dropping malformed transaction record"
                    );
                    batch.dropped.push(index);
                }
            }
        }

        debug!(
            valid = batch.records.len(),
            dropped = batch.dropped.len(),
            "Batch normalized"
        );

        batch
    }

    /// Normalize a single record; `None` if it is not a JSON object.
    pub fn normalize(&self, raw: &Value) -> Option<Transaction> {
        raw.as_object().map(|object| self.normalize_object(object))
    }

    /// Extract typed fields from an object, defaulting anything missing or malformed.
    pub fn normalize_object(&self, object: &Map<String, Value>) -> Transaction {
        let extra = object
            .iter()
            .filter(|(key, _)| !RECOGNIZED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Transaction {
            amount: object.get("amount").map(coerce_amount).unwrap_or(0.0),
            date: object.get("date").map(coerce_string).unwrap_or_default(),
            merchant_name: object
                .get("merchant_name")
                .map(coerce_string)
                .unwrap_or_default(),
            category: object
                .get("category")
                .map(coerce_string_list)
                .unwrap_or_default(),
            location: object
                .get("location")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            payment_channel: object
                .get("payment_channel")
                .map(coerce_string)
                .unwrap_or_default(),
            pending: object.get("pending").map(coerce_bool).unwrap_or(false),
            extra,
        }
    }
}

/// Numbers pass through, numeric strings are parsed, booleans map to 1/0.
///
/// Strings such as `"NaN"` or `"inf"` parse to non-finite values; they are
/// kept as-is and rejected by the scorer.
fn coerce_amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(coerce_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
