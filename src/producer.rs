//! NATS producer for scored results

use crate::types::request::ScoringResponse;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes scoring responses to the requester or the result subject
#[derive(Clone)]
pub struct ResultProducer {
    client: Client,
    subject: String,
}

impl ResultProducer {
    /// Create a new result producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a response, to `reply` when the request asked for one
    pub async fn publish(&self, reply: Option<Subject>, response: &ScoringResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;

        let target = match reply {
            Some(reply) => reply,
            None => Subject::from(self.subject.as_str()),
        };

        debug!(subject = %target, bytes = payload.len(), "Publishing scoring response");

        self.client.publish(target, payload.into()).await?;

        Ok(())
    }

    /// Get the result subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
