//! NATS consumer for incoming scoring requests

use crate::types::request::{BatchRequest, SingleRequest};
use anyhow::Result;
use async_nats::{Client, Message};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::info;

/// Which subject a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Batch,
    Single,
}

/// A decoded request payload
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingRequest {
    Batch(BatchRequest),
    Single(SingleRequest),
}

impl IncomingRequest {
    /// Decode a payload according to the subject it arrived on
    pub fn decode(kind: RequestKind, payload: &[u8]) -> serde_json::Result<Self> {
        match kind {
            RequestKind::Batch => serde_json::from_slice(payload).map(IncomingRequest::Batch),
            RequestKind::Single => serde_json::from_slice(payload).map(IncomingRequest::Single),
        }
    }
}

/// Consumer for receiving transaction batches and ad hoc requests from NATS
pub struct TransactionConsumer {
    client: Client,
    batch_subject: String,
    single_subject: String,
}

impl TransactionConsumer {
    /// Create a new transaction consumer
    pub fn new(client: Client, batch_subject: &str, single_subject: &str) -> Self {
        Self {
            client,
            batch_subject: batch_subject.to_string(),
            single_subject: single_subject.to_string(),
        }
    }

    /// Subscribe to both request subjects, merged into one stream
    pub async fn subscribe(&self) -> Result<BoxStream<'static, (RequestKind, Message)>> {
        let batches = self.client.subscribe(self.batch_subject.clone()).await?;
        info!(subject = %self.batch_subject, "Subscribed to batch subject");

        let singles = self.client.subscribe(self.single_subject.clone()).await?;
        info!(subject = %self.single_subject, "Subscribed to single-transaction subject");

        Ok(stream::select(
            batches.map(|m| (RequestKind::Batch, m)),
            singles.map(|m| (RequestKind::Single, m)),
        )
        .boxed())
    }

    /// Get the batch subject name
    pub fn batch_subject(&self) -> &str {
        &self.batch_subject
    }

    /// Get the single-transaction subject name
    pub fn single_subject(&self) -> &str {
        &self.single_subject
    }
}
