//! Port for pushing frames to connected WebSocket clients.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::define_port_error;

define_port_error! {
    /// Failures surfaced by socket broadcaster adapters.
    pub enum BroadcastError {
        /// The frame could not be handed to the connection layer.
        Send { message: String } => "socket send failed: {message}",
    }
}

/// Port for delivering server-pushed frames.
///
/// Delivery is best effort: a user with no open socket is not an error, the
/// frame is simply dropped and the persistent record remains.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocketBroadcaster: Send + Sync {
    /// Push one JSON frame to every open connection of `user_id`.
    async fn send_to_user(&self, user_id: Uuid, frame: &Value) -> Result<(), BroadcastError>;
}

/// Broadcaster that drops every frame, for tests and offline tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

#[async_trait]
impl SocketBroadcaster for NoopBroadcaster {
    async fn send_to_user(&self, _user_id: Uuid, _frame: &Value) -> Result<(), BroadcastError> {
        Ok(())
    }
}
