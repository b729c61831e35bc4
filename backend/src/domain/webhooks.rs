//! Payment-processor webhook handling.
//!
//! Signature verification happens at the HTTP edge; this service owns the
//! semantics: exactly-once application keyed by the processor's event id,
//! and a dead-letter queue for events that cannot be applied.

use std::sync::Arc;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::booking_service::BookingService;
use crate::domain::ports::{DeadLetter, WebhookRepository};

/// Processor event kinds the handler understands, named as the processor
/// sends them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventKind {
    /// A capture the processor confirmed out of band.
    #[serde(rename = "payment_intent.succeeded")]
    PaymentSucceeded,
    /// A capture the processor could not settle.
    #[serde(rename = "payment_intent.payment_failed")]
    PaymentFailed,
    /// An asynchronous refund settled.
    #[serde(rename = "charge.refunded")]
    ChargeRefunded,
}

/// A verified, decoded processor event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Processor-assigned id; the idempotency key.
    pub id: String,
    pub kind: WebhookEventKind,
    pub booking_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    /// Processor-supplied failure detail on `payment_intent.payment_failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What the handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    Applied,
    /// Seen before; nothing was re-applied.
    Duplicate,
    /// Could not be applied and was parked for review.
    DeadLettered,
}

/// Applies processor events to the booking engine.
#[derive(Clone)]
pub struct WebhookService {
    webhooks: Arc<dyn WebhookRepository>,
    bookings: BookingService,
    clock: Arc<dyn Clock>,
}

impl WebhookService {
    pub fn new(
        webhooks: Arc<dyn WebhookRepository>,
        bookings: BookingService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            webhooks,
            bookings,
            clock,
        }
    }

    /// Apply one event, exactly once.
    ///
    /// Failures to apply do not error the delivery: the processor would
    /// retry forever. The event is parked instead and the endpoint returns
    /// success.
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookDisposition, Error> {
        let fresh = self
            .webhooks
            .mark_processed(&event.id)
            .await
            .map_err(|error| Error::internal(format!("webhook repository error: {error}")))?;
        if !fresh {
            info!(event_id = %event.id, "duplicate webhook ignored");
            return Ok(WebhookDisposition::Duplicate);
        }

        let applied = match event.kind {
            WebhookEventKind::ChargeRefunded => self
                .bookings
                .confirm_refund(event.booking_id)
                .await
                .map(|_| ()),
            WebhookEventKind::PaymentSucceeded => {
                let payment_ref = event.payment_ref.clone().unwrap_or_default();
                self.bookings
                    .confirm_capture(event.booking_id, &payment_ref)
                    .await
                    .map(|_| ())
            }
            WebhookEventKind::PaymentFailed => self
                .bookings
                .flag_capture_failed(event.booking_id, event.reason.clone())
                .await
                .map(|_| ()),
        };
        match applied {
            Ok(()) => Ok(WebhookDisposition::Applied),
            Err(error) => {
                warn!(event_id = %event.id, %error, "webhook event dead-lettered");
                let letter = DeadLetter {
                    event_id: event.id.clone(),
                    payload: serde_json::to_value(&event)
                        .map_err(|err| Error::internal(format!("event encode failed: {err}")))?,
                    reason: error.message().to_owned(),
                    received_at: self.clock.utc(),
                };
                self.webhooks
                    .push_dead_letter(&letter)
                    .await
                    .map_err(|error| {
                        Error::internal(format!("webhook repository error: {error}"))
                    })?;
                Ok(WebhookDisposition::DeadLettered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Exactly-once and dead-letter coverage.

    use mockable::DefaultClock;
    use rstest::rstest;

    use super::*;
    use crate::domain::booking::{
        Booking, BookingDraft, GeoPoint, PaymentMethod, PaymentStatus, PricingSnapshot,
        ServiceLocation,
    };
    use crate::domain::booking_service::{BookingPolicy, BookingServiceDeps};
    use crate::domain::money::{Currency, Money};
    use crate::domain::ports::{
        BookingRepository as _, FixturePaymentGateway, NoopNotificationSink, WebhookRepository as _,
    };
    use crate::outbound::persistence::MemoryStore;

    fn service(store: &MemoryStore) -> WebhookService {
        let bookings = BookingService::new(
            BookingServiceDeps {
                bookings: Arc::new(store.clone()),
                ledger: Arc::new(store.clone()),
                otps: Arc::new(store.clone()),
                tracking: Arc::new(store.clone()),
                categories: Arc::new(store.clone()),
                promos: Arc::new(store.clone()),
                directory: Arc::new(store.clone()),
                gateway: Arc::new(FixturePaymentGateway),
                notifier: Arc::new(NoopNotificationSink),
                clock: Arc::new(DefaultClock),
            },
            BookingPolicy::default(),
        );
        WebhookService::new(Arc::new(store.clone()), bookings, Arc::new(DefaultClock))
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_bookings_are_dead_lettered_not_errored() {
        let store = MemoryStore::new();
        let webhooks = service(&store);
        let disposition = webhooks
            .handle(WebhookEvent {
                id: "evt-1".to_owned(),
                kind: WebhookEventKind::ChargeRefunded,
                booking_id: Uuid::new_v4(),
                payment_ref: None,
                reason: None,
            })
            .await
            .expect("delivery succeeds");
        assert_eq!(disposition, WebhookDisposition::DeadLettered);
        let parked = store.list_dead_letters().await.expect("letters load");
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].event_id, "evt-1");
    }

    #[rstest]
    fn kinds_decode_from_the_processor_wire_names() {
        for (wire, kind) in [
            ("payment_intent.succeeded", WebhookEventKind::PaymentSucceeded),
            (
                "payment_intent.payment_failed",
                WebhookEventKind::PaymentFailed,
            ),
            ("charge.refunded", WebhookEventKind::ChargeRefunded),
        ] {
            let decoded: WebhookEventKind =
                serde_json::from_value(serde_json::json!(wire)).expect("decodes");
            assert_eq!(decoded, kind);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn failed_captures_flag_the_payment() {
        let store = MemoryStore::new();
        let webhooks = service(&store);
        let booking = Booking::create(
            BookingDraft {
                id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                category_id: Uuid::new_v4(),
                location: ServiceLocation {
                    point: GeoPoint {
                        lat: 12.9716,
                        lon: 77.5946,
                    },
                    address: "42 Residency Road".to_owned(),
                },
                scheduled_at: None,
                pricing: PricingSnapshot {
                    quoted_amount: Money::from_minor(100_000),
                    platform_fee: Money::from_minor(15_000),
                    servicer_earning: Money::from_minor(85_000),
                    currency: Currency::new("inr"),
                },
                method: PaymentMethod::Card,
            },
            chrono::Utc::now(),
        );
        store.insert(&booking).await.expect("insert succeeds");

        let event = WebhookEvent {
            id: "evt-3".to_owned(),
            kind: WebhookEventKind::PaymentFailed,
            booking_id: booking.id,
            payment_ref: None,
            reason: Some("card_declined".to_owned()),
        };
        let disposition = webhooks.handle(event.clone()).await.expect("delivery");
        assert_eq!(disposition, WebhookDisposition::Applied);
        let stored = store
            .find_by_id(booking.id)
            .await
            .expect("lookup succeeds")
            .expect("booking exists");
        assert_eq!(stored.payment_status, PaymentStatus::Failed);

        let replay = WebhookEvent {
            id: "evt-4".to_owned(),
            ..event
        };
        let disposition = webhooks.handle(replay).await.expect("delivery");
        assert_eq!(disposition, WebhookDisposition::Applied, "flagging is idempotent");
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_event_ids_are_ignored() {
        let store = MemoryStore::new();
        let webhooks = service(&store);
        let event = WebhookEvent {
            id: "evt-2".to_owned(),
            kind: WebhookEventKind::ChargeRefunded,
            booking_id: Uuid::new_v4(),
            payment_ref: None,
            reason: None,
        };
        let first = webhooks.handle(event.clone()).await.expect("delivery");
        assert_eq!(first, WebhookDisposition::DeadLettered);
        let second = webhooks.handle(event).await.expect("delivery");
        assert_eq!(second, WebhookDisposition::Duplicate);
        let parked = store.list_dead_letters().await.expect("letters load");
        assert_eq!(parked.len(), 1, "no second dead letter");
    }
}
