//! Port for chat message persistence adapters and their errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::chat::{ChatMessage, MessageBody};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by chat repository adapters.
    pub enum ChatRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "chat repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "chat repository query failed: {message}",
    }
}

/// A message accepted for storage but not yet sequenced.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub booking_id: Uuid,
    pub sender_id: Uuid,
    pub body: MessageBody,
    pub sent_at: DateTime<Utc>,
}

/// Port for the per-booking message log.
///
/// `append` assigns the next sequence number for the booking; concurrent
/// appends must still produce a gap-free, strictly increasing sequence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Sequence and persist a message, returning the stored form.
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, ChatRepositoryError>;

    /// Messages for a booking with `seq > after_seq`, in sequence order.
    async fn list_after(
        &self,
        booking_id: Uuid,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatRepositoryError>;

    /// Mark everything up to `seq` as read by `reader_id`.
    async fn mark_read_up_to(
        &self,
        booking_id: Uuid,
        reader_id: Uuid,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Result<(), ChatRepositoryError>;

    /// Tombstone every message of a booking, keeping sequence slots.
    ///
    /// Returns the number of messages that held content.
    async fn tombstone_booking(&self, booking_id: Uuid) -> Result<u64, ChatRepositoryError>;

    /// Tombstone one message, keeping its sequence slot.
    ///
    /// Returns whether the message existed.
    async fn tombstone_message(
        &self,
        booking_id: Uuid,
        seq: u64,
    ) -> Result<bool, ChatRepositoryError>;
}

/// Fixture implementation for tests that do not exercise chat storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureChatRepository;

#[async_trait]
impl ChatRepository for FixtureChatRepository {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, ChatRepositoryError> {
        Ok(ChatMessage {
            id: Uuid::new_v4(),
            booking_id: message.booking_id,
            sender_id: message.sender_id,
            seq: 1,
            body: message.body,
            sent_at: message.sent_at,
            delivered_at: None,
            read_at: None,
        })
    }

    async fn list_after(
        &self,
        _booking_id: Uuid,
        _after_seq: u64,
        _limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatRepositoryError> {
        Ok(Vec::new())
    }

    async fn mark_read_up_to(
        &self,
        _booking_id: Uuid,
        _reader_id: Uuid,
        _seq: u64,
        _now: DateTime<Utc>,
    ) -> Result<(), ChatRepositoryError> {
        Ok(())
    }

    async fn tombstone_booking(&self, _booking_id: Uuid) -> Result<u64, ChatRepositoryError> {
        Ok(0)
    }

    async fn tombstone_message(
        &self,
        _booking_id: Uuid,
        _seq: u64,
    ) -> Result<bool, ChatRepositoryError> {
        Ok(false)
    }
}
