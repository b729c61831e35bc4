//! Port for the notification fanout sink.

use async_trait::async_trait;

use crate::domain::notifications::NotificationEvent;

use super::define_port_error;

define_port_error! {
    /// Failures surfaced by notification sinks.
    pub enum NotificationSinkError {
        /// The event could not be persisted or delivered.
        Publish { message: String } => "notification publish failed: {message}",
    }
}

/// Port through which services announce occurrences.
///
/// Implementations own the split into socket frames, inbox records, and
/// emails; services emit exactly one event per occurrence and never talk to
/// sockets or mailers directly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationSinkError>;
}

/// Sink that swallows events, for tests and offline tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn publish(&self, _event: &NotificationEvent) -> Result<(), NotificationSinkError> {
        Ok(())
    }
}
