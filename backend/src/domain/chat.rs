//! In-booking chat messages.
//!
//! Chat is scoped to a booking and its two participants. Messages carry a
//! per-booking monotonic sequence number assigned by the store, which is the
//! ordering clients rely on. The log opens at acceptance and stays open
//! through a terminal state plus the retention window; removed content is
//! replaced by a tombstone rather than deleted, so sequence numbers never
//! develop holes.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::booking::GeoPoint;

/// How long after a booking's terminal state its chat stays readable;
/// past this the log is tombstoned.
pub const RETENTION: TimeDelta = TimeDelta::days(7);
/// Longest accepted text body, in characters.
pub const MAX_TEXT_CHARS: usize = 4_000;
/// Longest accepted attachment URL.
pub const MAX_URL_CHARS: usize = 2_048;

/// Payload of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: String },
    Image { url: String },
    File { url: String, name: String },
    Location { point: GeoPoint },
    /// Content removed by retention; the slot in the sequence remains.
    Tombstone,
}

impl MessageBody {
    /// Enforce the content allow-list and size limits.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Text { text } => {
                if text.trim().is_empty() {
                    return Err(Error::validation("text messages must not be empty"));
                }
                if text.chars().count() > MAX_TEXT_CHARS {
                    return Err(Error::validation(format!(
                        "text messages are limited to {MAX_TEXT_CHARS} characters"
                    )));
                }
            }
            Self::Image { url } | Self::File { url, .. } => {
                if !url.starts_with("https://") {
                    return Err(Error::validation("attachment URLs must be https"));
                }
                if url.chars().count() > MAX_URL_CHARS {
                    return Err(Error::validation("attachment URL is too long"));
                }
            }
            Self::Location { point } => {
                if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
                    return Err(Error::validation("coordinates are out of range"));
                }
            }
            Self::Tombstone => {
                return Err(Error::validation("tombstones cannot be sent"));
            }
        }
        Ok(())
    }
}

/// One chat message with delivery receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub sender_id: Uuid,
    /// Per-booking monotonic sequence number, assigned by the store.
    pub seq: u64,
    #[serde(flatten)]
    pub body: MessageBody,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Replace the content with a tombstone, keeping the sequence slot.
    pub fn tombstone(&mut self) {
        self.body = MessageBody::Tombstone;
    }

    /// Record delivery; first receipt wins.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        if self.delivered_at.is_none() {
            self.delivered_at = Some(now);
        }
    }

    /// Record the read receipt; also backfills delivery.
    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        self.mark_delivered(now);
        if self.read_at.is_none() {
            self.read_at = Some(now);
        }
    }
}
