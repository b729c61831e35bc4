//! Notification events and per-user records.
//!
//! Services emit a single [`NotificationEvent`] per occurrence; the fanout
//! sink turns it into live socket frames, one persistent record per
//! recipient, and an email for the kinds that warrant one. Services never
//! talk to sockets or mailers directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    BookingAccepted,
    BookingScheduled,
    BookingStarted,
    OtpIssued,
    BookingCompleted,
    CancelRequested,
    BookingCancelled,
    PaymentReceipt,
    PaymentFailed,
    CashCollected,
    PayoutApproved,
    PayoutRejected,
    NewChatMessage,
}

impl NotificationKind {
    /// Kinds that also send an email, not just a socket frame.
    ///
    /// High-value milestones only; chat and tracking chatter stays on the
    /// socket.
    pub fn is_email_worthy(self) -> bool {
        matches!(
            self,
            Self::BookingAccepted
                | Self::OtpIssued
                | Self::BookingCompleted
                | Self::BookingCancelled
                | Self::PaymentReceipt
                | Self::PaymentFailed
                | Self::PayoutApproved
        )
    }
}

/// One occurrence to fan out to a set of recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub recipients: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        kind: NotificationKind,
        recipients: Vec<Uuid>,
        booking_id: Option<Uuid>,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            recipients,
            booking_id,
            payload,
            created_at,
        }
    }
}

/// Persistent per-recipient record behind `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Materialise one record per recipient of `event`.
    pub fn from_event(event: &NotificationEvent) -> Vec<Self> {
        event
            .recipients
            .iter()
            .map(|user_id| Self {
                id: Uuid::new_v4(),
                user_id: *user_id,
                kind: event.kind,
                booking_id: event.booking_id,
                payload: event.payload.clone(),
                created_at: event.created_at,
                read_at: None,
            })
            .collect()
    }

    /// Record the read receipt; first read wins.
    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        if self.read_at.is_none() {
            self.read_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(NotificationKind::BookingAccepted, true)]
    #[case(NotificationKind::PaymentReceipt, true)]
    #[case(NotificationKind::PayoutApproved, true)]
    #[case(NotificationKind::NewChatMessage, false)]
    #[case(NotificationKind::BookingCreated, false)]
    fn email_worthiness(#[case] kind: NotificationKind, #[case] expected: bool) {
        assert_eq!(kind.is_email_worthy(), expected);
    }

    #[rstest]
    fn records_fan_out_per_recipient() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 13, 0, 0)
            .single()
            .expect("valid ts");
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let event = NotificationEvent::new(
            NotificationKind::BookingCompleted,
            vec![a, b],
            Some(Uuid::new_v4()),
            serde_json::json!({ "amount": 100_000 }),
            now,
        );
        let records = NotificationRecord::from_event(&event);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, a);
        assert_eq!(records[1].user_id, b);
        assert!(records.iter().all(|r| r.read_at.is_none()));
    }

    #[rstest]
    fn read_receipt_is_sticky() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 13, 0, 0)
            .single()
            .expect("valid ts");
        let event = NotificationEvent::new(
            NotificationKind::OtpIssued,
            vec![Uuid::new_v4()],
            None,
            Value::Null,
            now,
        );
        let mut record = NotificationRecord::from_event(&event).remove(0);
        record.mark_read(now);
        record.mark_read(now + chrono::TimeDelta::minutes(2));
        assert_eq!(record.read_at, Some(now));
    }
}
