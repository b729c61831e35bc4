//! Port for webhook idempotency and dead-letter storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by webhook repository adapters.
    pub enum WebhookRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "webhook repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "webhook repository query failed: {message}",
    }
}

/// An event the handler could not apply, parked for operator review.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub event_id: String,
    pub payload: Value,
    pub reason: String,
    pub received_at: DateTime<Utc>,
}

/// Port for webhook bookkeeping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Record an event id; returns false when it was already processed.
    async fn mark_processed(&self, event_id: &str) -> Result<bool, WebhookRepositoryError>;

    /// Park an unprocessable event.
    async fn push_dead_letter(&self, letter: &DeadLetter) -> Result<(), WebhookRepositoryError>;

    /// Parked events, oldest first.
    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>, WebhookRepositoryError>;
}

/// Fixture that treats every event as new and drops dead letters.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureWebhookRepository;

#[async_trait]
impl WebhookRepository for FixtureWebhookRepository {
    async fn mark_processed(&self, _event_id: &str) -> Result<bool, WebhookRepositoryError> {
        Ok(true)
    }

    async fn push_dead_letter(&self, _letter: &DeadLetter) -> Result<(), WebhookRepositoryError> {
        Ok(())
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>, WebhookRepositoryError> {
        Ok(Vec::new())
    }
}
