//! Transaction data structures for batch anomaly scoring

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names the normalizer extracts into typed fields.
/// Everything else on a record lands in [`Transaction::extra`].
pub const RECOGNIZED_FIELDS: [&str; 7] = [
    "amount",
    "date",
    "merchant_name",
    "category",
    "location",
    "payment_channel",
    "pending",
];

/// A normalized banking transaction.
///
/// Every field has a safe default, so any JSON object can be turned into a
/// `Transaction`; see [`crate::normalizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction amount (0.0 when absent or unparsable)
    #[serde(default)]
    pub amount: f64,

    /// Posting date as supplied by the source (usually `YYYY-MM-DD`)
    #[serde(default)]
    pub date: String,

    /// Merchant display name
    #[serde(default)]
    pub merchant_name: String,

    /// Category hierarchy, most general first
    #[serde(default)]
    pub category: Vec<String>,

    /// Free-form location attributes (city, region, lat/lon, ...)
    #[serde(default)]
    pub location: Map<String, Value>,

    /// Channel such as `online`, `in store`, `other`
    #[serde(default)]
    pub payment_channel: String,

    /// Whether the transaction is still pending
    #[serde(default)]
    pub pending: bool,

    /// Unrecognized fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// Create a transaction with the given amount and merchant; other fields default
    pub fn new(amount: f64, merchant_name: impl Into<String>) -> Self {
        Self {
            amount,
            date: String::new(),
            merchant_name: merchant_name.into(),
            category: Vec::new(),
            location: Map::new(),
            payment_channel: String::new(),
            pending: false,
            extra: Map::new(),
        }
    }

    /// Set the posting date
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Set the category hierarchy
    pub fn with_category(mut self, category: Vec<String>) -> Self {
        self.category = category;
        self
    }

    /// Set the payment channel
    pub fn with_payment_channel(mut self, channel: impl Into<String>) -> Self {
        self.payment_channel = channel.into();
        self
    }

    /// Attach an unrecognized field
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Whether `field` is one of the typed transaction fields
    pub fn is_recognized(field: &str) -> bool {
        RECOGNIZED_FIELDS.contains(&field)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new(0.0, "")
    }
}
