//! Chat orchestration: participant checks, retention, and fanout.

use std::sync::Arc;

use mockable::Clock;
use tracing::warn;
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::booking::{Booking, BookingState};
use crate::domain::booking_service_support::map_booking_repository_error;
use crate::domain::chat::{ChatMessage, MessageBody, RETENTION};
use crate::domain::notifications::{NotificationEvent, NotificationKind};
use crate::domain::ports::{
    BookingRepository, ChatRepository, NewChatMessage, NotificationSink, SocketBroadcaster,
};

/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Sends, lists, and sweeps in-booking chat.
#[derive(Clone)]
pub struct ChatService {
    chats: Arc<dyn ChatRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<dyn NotificationSink>,
    broadcaster: Arc<dyn SocketBroadcaster>,
    clock: Arc<dyn Clock>,
}

impl ChatService {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifier: Arc<dyn NotificationSink>,
        broadcaster: Arc<dyn SocketBroadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chats,
            bookings,
            notifier,
            broadcaster,
            clock,
        }
    }

    /// Relay a transient typing indicator to the other participant.
    ///
    /// Nothing is persisted; the indicator rides the socket only.
    pub async fn typing(&self, booking_id: Uuid, sender_id: Uuid) -> Result<(), Error> {
        let booking = self.load_booking(booking_id, sender_id).await?;
        let frame = serde_json::json!({
            "type": "typing",
            "bookingId": booking_id,
            "userId": sender_id,
        });
        for recipient in booking
            .participants()
            .into_iter()
            .filter(|id| *id != sender_id)
        {
            if let Err(error) = self.broadcaster.send_to_user(recipient, &frame).await {
                warn!(%booking_id, %error, "typing broadcast failed");
            }
        }
        Ok(())
    }

    /// Validate and store a message, then notify the other participant.
    ///
    /// Chat opens at acceptance and stays open through `cancel_requested`
    /// and for the retention window after a terminal state.
    pub async fn send(
        &self,
        booking_id: Uuid,
        sender_id: Uuid,
        body: MessageBody,
    ) -> Result<ChatMessage, Error> {
        body.validate()?;
        let booking = self.load_booking(booking_id, sender_id).await?;
        let now = self.clock.utc();
        self.check_window(&booking, now).await?;
        let stored = self
            .chats
            .append(NewChatMessage {
                booking_id,
                sender_id,
                body,
                sent_at: now,
            })
            .await
            .map_err(|error| Error::internal(format!("chat repository error: {error}")))?;

        let recipients: Vec<Uuid> = booking
            .participants()
            .into_iter()
            .filter(|id| *id != sender_id)
            .collect();
        if !recipients.is_empty() {
            let event = NotificationEvent::new(
                NotificationKind::NewChatMessage,
                recipients,
                Some(booking_id),
                serde_json::json!({ "seq": stored.seq }),
                now,
            );
            if let Err(error) = self.notifier.publish(&event).await {
                warn!(%booking_id, %error, "chat notification failed");
            }
        }
        Ok(stored)
    }

    /// Page through a booking's history; participants only.
    ///
    /// History stays readable after the window closes, but a read past the
    /// retention cutoff sweeps the log first, so retention needs no
    /// scheduler.
    pub async fn history(
        &self,
        booking_id: Uuid,
        reader_id: Uuid,
        after_seq: u64,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, Error> {
        let booking = self.load_booking(booking_id, reader_id).await?;
        if Self::is_past_retention(&booking, self.clock.utc()) {
            self.sweep(booking_id).await;
        }
        self.chats
            .list_after(
                booking_id,
                after_seq,
                limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            )
            .await
            .map_err(|error| Error::internal(format!("chat repository error: {error}")))
    }

    /// Record the reader's receipts up to `seq`.
    pub async fn mark_read(
        &self,
        booking_id: Uuid,
        reader_id: Uuid,
        seq: u64,
    ) -> Result<(), Error> {
        self.load_booking(booking_id, reader_id).await?;
        self.chats
            .mark_read_up_to(booking_id, reader_id, seq, self.clock.utc())
            .await
            .map_err(|error| Error::internal(format!("chat repository error: {error}")))
    }

    /// Tombstone one of the sender's own messages.
    ///
    /// The sequence slot survives, so readers see a tombstone where the
    /// content was.
    pub async fn delete(
        &self,
        booking_id: Uuid,
        sender_id: Uuid,
        seq: u64,
    ) -> Result<(), Error> {
        self.load_booking(booking_id, sender_id).await?;
        let message = self
            .chats
            .list_after(booking_id, seq.saturating_sub(1), 1)
            .await
            .map_err(|error| Error::internal(format!("chat repository error: {error}")))?
            .into_iter()
            .find(|message| message.seq == seq)
            .ok_or_else(|| Error::not_found("no such message"))?;
        if message.sender_id != sender_id {
            return Err(Error::forbidden("only the sender can delete a message"));
        }
        self.chats
            .tombstone_message(booking_id, seq)
            .await
            .map_err(|error| Error::internal(format!("chat repository error: {error}")))?;
        Ok(())
    }

    /// Reject sends outside the chat window.
    async fn check_window(
        &self,
        booking: &Booking,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), Error> {
        if booking.state == BookingState::Pending {
            return Err(Error::validation("chat opens once the booking is accepted"));
        }
        if Self::is_past_retention(booking, now) {
            self.sweep(booking.id).await;
            return Err(Error::validation("chat is closed for this booking"));
        }
        Ok(())
    }

    fn is_past_retention(booking: &Booking, now: chrono::DateTime<chrono::Utc>) -> bool {
        booking
            .terminal_at()
            .is_some_and(|terminal| now - terminal >= RETENTION)
    }

    async fn sweep(&self, booking_id: Uuid) {
        if let Err(error) = self.chats.tombstone_booking(booking_id).await {
            warn!(%booking_id, %error, "retention sweep failed");
        }
    }

    async fn load_booking(&self, booking_id: Uuid, user_id: Uuid) -> Result<Booking, Error> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await
            .map_err(map_booking_repository_error)?
            .ok_or_else(|| Error::not_found("no such booking"))?;
        if !booking.is_participant(user_id) {
            return Err(Error::forbidden("not a participant of this booking"));
        }
        Ok(booking)
    }
}
