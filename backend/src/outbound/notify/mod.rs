//! Notification fanout: one domain event in, inbox records, socket frames,
//! and (for the important kinds) an email out.
//!
//! The inbox write is the durable leg and the only one allowed to fail the
//! publish; sockets and email are best effort.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::domain::notifications::{NotificationEvent, NotificationKind, NotificationRecord};
use crate::domain::ports::{
    EmailMessage, Mailer, NotificationRepository, NotificationSink, NotificationSinkError,
    SocketBroadcaster, UserDirectory,
};

/// Fans one event out to every delivery channel.
#[derive(Clone)]
pub struct NotificationFanout {
    records: Arc<dyn NotificationRepository>,
    broadcaster: Arc<dyn SocketBroadcaster>,
    mailer: Arc<dyn Mailer>,
    directory: Arc<dyn UserDirectory>,
}

impl NotificationFanout {
    pub fn new(
        records: Arc<dyn NotificationRepository>,
        broadcaster: Arc<dyn SocketBroadcaster>,
        mailer: Arc<dyn Mailer>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            records,
            broadcaster,
            mailer,
            directory,
        }
    }

    fn subject_for(kind: NotificationKind) -> &'static str {
        match kind {
            NotificationKind::BookingAccepted => "Your booking was accepted",
            NotificationKind::OtpIssued => "Your service completion code",
            NotificationKind::BookingCompleted => "Your booking is complete",
            NotificationKind::BookingCancelled => "Your booking was cancelled",
            NotificationKind::PaymentReceipt => "Payment receipt",
            NotificationKind::PaymentFailed => "We could not take your payment",
            NotificationKind::PayoutApproved => "Your payout is on its way",
            _ => "Booking update",
        }
    }

    async fn email_recipients(&self, event: &NotificationEvent) {
        for recipient in &event.recipients {
            let address = match self.directory.email_of(*recipient).await {
                Ok(Some(address)) => address,
                Ok(None) => continue,
                Err(error) => {
                    warn!(user_id = %recipient, %error, "email lookup failed");
                    continue;
                }
            };
            let message = EmailMessage {
                to: address,
                subject: Self::subject_for(event.kind).to_owned(),
                body: event.payload.to_string(),
            };
            if let Err(error) = self.mailer.send(&message).await {
                warn!(user_id = %recipient, %error, "notification email failed");
            }
        }
    }
}

#[async_trait]
impl NotificationSink for NotificationFanout {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationSinkError> {
        let records = NotificationRecord::from_event(event);
        self.records
            .append(&records)
            .await
            .map_err(|error| NotificationSinkError::publish(error.to_string()))?;

        for record in &records {
            let frame = json!({ "type": "notification", "notification": record });
            if let Err(error) = self.broadcaster.send_to_user(record.user_id, &frame).await {
                warn!(user_id = %record.user_id, %error, "notification frame dropped");
            }
        }

        if event.kind.is_email_worthy() {
            self.email_recipients(event).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Channel split coverage.

    use std::sync::Mutex;

    use rstest::rstest;
    use uuid::Uuid;

    use super::*;
    use crate::domain::ports::MailerError;
    use crate::outbound::persistence::MemoryStore;

    #[derive(Debug, Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
            self.sent.lock().expect("sent mutex").push(message.clone());
            Ok(())
        }
    }

    fn fanout(store: &MemoryStore, mailer: Arc<dyn Mailer>) -> NotificationFanout {
        NotificationFanout::new(
            Arc::new(store.clone()),
            Arc::new(crate::domain::ports::NoopBroadcaster),
            mailer,
            Arc::new(store.clone()),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn email_worthy_kinds_reach_known_addresses() {
        let store = MemoryStore::new();
        let mailer = Arc::new(RecordingMailer::default());
        let sink = fanout(&store, mailer.clone());
        let customer = Uuid::new_v4();
        store.set_email(customer, "customer@example.in");

        sink.publish(&NotificationEvent::new(
            NotificationKind::OtpIssued,
            vec![customer],
            None,
            json!({ "code": "123456" }),
            chrono::Utc::now(),
        ))
        .await
        .expect("publish succeeds");

        let sent = mailer.sent.lock().expect("sent mutex");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "customer@example.in");
        assert_eq!(sent[0].subject, "Your service completion code");
        let inbox = store.list_for_user(customer, 10).await.expect("inbox");
        assert_eq!(inbox.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn chatter_kinds_stay_out_of_email() {
        let store = MemoryStore::new();
        let mailer = Arc::new(RecordingMailer::default());
        let sink = fanout(&store, mailer.clone());
        let servicer = Uuid::new_v4();
        store.set_email(servicer, "servicer@example.in");

        sink.publish(&NotificationEvent::new(
            NotificationKind::NewChatMessage,
            vec![servicer],
            None,
            json!({ "seq": 3 }),
            chrono::Utc::now(),
        ))
        .await
        .expect("publish succeeds");

        assert!(mailer.sent.lock().expect("sent mutex").is_empty());
        let inbox = store.list_for_user(servicer, 10).await.expect("inbox");
        assert_eq!(inbox.len(), 1);
    }
}
