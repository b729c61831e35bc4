//! End-to-end scenario coverage for the booking coordinator, run against
//! the in-memory store and a fixture payment processor.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::Value;

use super::*;
use crate::domain::booking::GeoPoint;
use crate::domain::ledger::PLATFORM_ACCOUNT;
use crate::domain::money::{Currency, Money};
use crate::domain::ports::{
    MockPaymentGateway, NotificationSinkError, RefundStatus,
};
use crate::domain::pricing::CategoryRate;
use crate::domain::tracking::TrackingSample;
use crate::outbound::persistence::MemoryStore;

/// Sink that records every published event for assertions.
#[derive(Debug, Default)]
struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotificationSinkError> {
        self.events
            .lock()
            .expect("sink mutex")
            .push(event.clone());
        Ok(())
    }
}

impl RecordingSink {
    fn kinds(&self) -> Vec<NotificationKind> {
        self.events
            .lock()
            .expect("sink mutex")
            .iter()
            .map(|event| event.kind)
            .collect()
    }

    /// The clear completion code from the most recent `OtpIssued` event.
    fn last_code(&self) -> Option<String> {
        self.events
            .lock()
            .expect("sink mutex")
            .iter()
            .rev()
            .find(|event| event.kind == NotificationKind::OtpIssued)
            .and_then(|event| event.payload.get("code"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

struct Harness {
    store: MemoryStore,
    sink: Arc<RecordingSink>,
    service: BookingService,
    customer: Uuid,
    servicer: Uuid,
    category: Uuid,
}

fn harness_with_gateway(gateway: Arc<dyn PaymentGateway>) -> Harness {
    let store = MemoryStore::new();
    let sink = Arc::new(RecordingSink::default());
    let category = Uuid::new_v4();
    store.set_rate(
        category,
        CategoryRate {
            base_rate: Money::from_minor(100_000),
            per_km_rate: Money::ZERO,
            floor: Money::from_minor(20_000),
        },
    );
    let customer = Uuid::new_v4();
    let servicer = Uuid::new_v4();
    store.add_servicer(category, servicer);
    let service = BookingService::new(
        BookingServiceDeps {
            bookings: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            otps: Arc::new(store.clone()),
            tracking: Arc::new(store.clone()),
            categories: Arc::new(store.clone()),
            promos: Arc::new(store.clone()),
            directory: Arc::new(store.clone()),
            gateway,
            notifier: sink.clone(),
            clock: Arc::new(DefaultClock),
        },
        BookingPolicy::default(),
    );
    Harness {
        store,
        sink,
        service,
        customer,
        servicer,
        category,
    }
}

fn harness() -> Harness {
    harness_with_gateway(Arc::new(crate::domain::ports::FixturePaymentGateway))
}

fn create_request(category: Uuid, method: PaymentMethod) -> CreateBookingRequest {
    CreateBookingRequest {
        category_id: category,
        location: ServiceLocation {
            point: GeoPoint {
                lat: 12.9716,
                lon: 77.5946,
            },
            address: "42 Residency Road".to_owned(),
        },
        scheduled_at: None,
        method,
        promo: None,
    }
}

async fn place_servicer_on_site(h: &Harness, booking: &Booking) {
    let servicer = booking.servicer_id.expect("assigned");
    crate::domain::ports::TrackingRepository::record_sample(
        &h.store,
        &TrackingSample {
            booking_id: booking.id,
            servicer_id: servicer,
            point: booking.location.point,
            recorded_at: chrono::Utc::now(),
        },
    )
    .await
    .expect("sample records");
}

/// Drive a card booking to `in_progress` and return it.
async fn start_card_booking(h: &Harness) -> Booking {
    let booking = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Card))
        .await
        .expect("create succeeds");
    assert_eq!(booking.payment_status, PaymentStatus::Authorized);
    let booking = h
        .service
        .accept(booking.id, h.servicer)
        .await
        .expect("accept succeeds");
    place_servicer_on_site(h, &booking).await;
    h.service
        .start(booking.id, h.servicer)
        .await
        .expect("start succeeds")
}

#[rstest]
#[tokio::test]
async fn happy_path_completes_and_splits_the_quote() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let code = h.sink.last_code().expect("code was issued");

    let booking = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("verification succeeds");

    assert_eq!(booking.state, BookingState::Completed);
    assert_eq!(booking.payment_status, PaymentStatus::Completed);
    assert!(booking.completed_at.is_some());

    let currency = Currency::new("inr");
    let ledger = &h.store;
    let customer_balance = crate::domain::ports::LedgerRepository::balance(
        ledger, h.customer, &currency,
    )
    .await
    .expect("balance");
    let platform_balance = crate::domain::ports::LedgerRepository::balance(
        ledger,
        PLATFORM_ACCOUNT,
        &currency,
    )
    .await
    .expect("balance");
    let servicer_balance = crate::domain::ports::LedgerRepository::balance(
        ledger, h.servicer, &currency,
    )
    .await
    .expect("balance");
    assert_eq!(customer_balance, Money::from_minor(-100_000));
    assert_eq!(platform_balance, Money::from_minor(15_000));
    assert_eq!(servicer_balance, Money::from_minor(85_000));

    let kinds = h.sink.kinds();
    assert!(kinds.contains(&NotificationKind::BookingCompleted));
    assert!(kinds.contains(&NotificationKind::PaymentReceipt));
}

#[rstest]
#[tokio::test]
async fn concurrent_accept_has_one_winner() {
    let h = harness();
    let booking = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Cash))
        .await
        .expect("create succeeds");
    let rival = Uuid::new_v4();

    let (first, second) = tokio::join!(
        h.service.accept(booking.id, h.servicer),
        h.service.accept(booking.id, rival),
    );
    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(wins, 1, "exactly one servicer wins");
    let loss = outcomes
        .iter()
        .find_map(|outcome| outcome.as_ref().err())
        .expect("one servicer loses");
    assert_eq!(loss.code(), ErrorCode::AlreadyAssigned);
}

#[rstest]
#[tokio::test]
async fn wrong_codes_lock_verification_and_keep_the_booking_in_progress() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let code = h.sink.last_code().expect("code was issued");
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for attempt in 1..=5 {
        let err = h
            .service
            .verify_completion(booking.id, h.customer, wrong)
            .await
            .expect_err("wrong code fails");
        let expected = if attempt < 5 {
            ErrorCode::OtpMismatch
        } else {
            ErrorCode::OtpLocked
        };
        assert_eq!(err.code(), expected, "attempt {attempt}");
    }
    // The right code is rejected while locked and the state is unchanged.
    let err = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect_err("locked");
    assert_eq!(err.code(), ErrorCode::OtpLocked);
    let booking = h
        .service
        .get(booking.id, h.servicer, Role::Servicer)
        .await
        .expect("booking loads");
    assert_eq!(booking.state, BookingState::InProgress);
}

#[rstest]
#[tokio::test]
async fn repeating_the_consumed_code_is_idempotent() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let code = h.sink.last_code().expect("code was issued");
    h.service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("verification succeeds");

    let again = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("replay succeeds");
    assert_eq!(again.state, BookingState::Completed);
    let entries = crate::domain::ports::LedgerRepository::entries_for_booking(
        &h.store, booking.id,
    )
    .await
    .expect("entries");
    assert_eq!(entries.len(), 3, "no double capture");

    let wrong = if code == "999999" { "000000" } else { "999999" };
    let err = h
        .service
        .verify_completion(booking.id, h.customer, wrong)
        .await
        .expect_err("a different code is not a replay");
    assert_eq!(err.code(), ErrorCode::IllegalTransition);
}

#[rstest]
#[tokio::test]
async fn cancellation_closes_once_the_service_starts() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let err = h
        .service
        .request_cancel(booking.id, h.customer)
        .await
        .expect_err("too late");
    assert_eq!(err.code(), ErrorCode::TooLateToCancel);
}

#[rstest]
#[tokio::test]
async fn pending_cancellation_is_direct_and_accepted_is_two_step() {
    let h = harness();
    let booking = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Cash))
        .await
        .expect("create succeeds");
    let cancelled = h
        .service
        .request_cancel(booking.id, h.customer)
        .await
        .expect("pending cancels directly");
    assert_eq!(cancelled.state, BookingState::Cancelled);

    let booking = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Cash))
        .await
        .expect("create succeeds");
    let booking = h
        .service
        .accept(booking.id, h.servicer)
        .await
        .expect("accept succeeds");
    let booking = h
        .service
        .request_cancel(booking.id, h.customer)
        .await
        .expect("request records");
    assert_eq!(booking.state, BookingState::CancelRequested);
    let booking = h
        .service
        .confirm_cancel(booking.id, h.servicer)
        .await
        .expect("servicer confirms");
    assert_eq!(booking.state, BookingState::Cancelled);
}

#[rstest]
#[tokio::test]
async fn refunds_post_once_and_replays_are_noops() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let code = h.sink.last_code().expect("code was issued");
    let booking = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("verification succeeds");

    let outcome = h.service.refund(booking.id).await.expect("refund succeeds");
    assert_eq!(outcome, RefundOutcome::Completed);
    let currency = Currency::new("inr");
    let balance = crate::domain::ports::LedgerRepository::balance(
        &h.store,
        PLATFORM_ACCOUNT,
        &currency,
    )
    .await
    .expect("balance");
    assert_eq!(balance, Money::ZERO);
    let entries = crate::domain::ports::LedgerRepository::entries_for_booking(
        &h.store, booking.id,
    )
    .await
    .expect("entries");
    assert_eq!(entries.len(), 6);

    let replay = h.service.refund(booking.id).await.expect("replay succeeds");
    assert_eq!(replay, RefundOutcome::AlreadyRefunded);
    let entries = crate::domain::ports::LedgerRepository::entries_for_booking(
        &h.store, booking.id,
    )
    .await
    .expect("entries");
    assert_eq!(entries.len(), 6, "no double posting");
}

#[rstest]
#[tokio::test]
async fn card_decline_blocks_creation() {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_authorize()
        .returning(|_| Err(crate::domain::ports::PaymentGatewayError::declined("do not honor")));
    let h = harness_with_gateway(Arc::new(gateway));
    let err = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Card))
        .await
        .expect_err("decline surfaces");
    assert_eq!(err.code(), ErrorCode::PaymentDeclined);
}

#[rstest]
#[tokio::test]
async fn capture_failure_keeps_completion_and_flags_the_payment() {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_authorize()
        .returning(|_| Ok("auth-1".to_owned()));
    gateway
        .expect_capture()
        .returning(|_, _| Err(crate::domain::ports::PaymentGatewayError::protocol("bad json")));
    let h = harness_with_gateway(Arc::new(gateway));
    let booking = start_card_booking(&h).await;
    let code = h.sink.last_code().expect("code was issued");
    let booking = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("completion stands");
    assert_eq!(booking.state, BookingState::Completed);
    assert_eq!(booking.payment_status, PaymentStatus::Failed);
    assert!(h.sink.kinds().contains(&NotificationKind::PaymentFailed));
}

#[rstest]
#[tokio::test]
async fn start_requires_the_servicer_on_site() {
    let h = harness();
    let booking = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Cash))
        .await
        .expect("create succeeds");
    let booking = h
        .service
        .accept(booking.id, h.servicer)
        .await
        .expect("accept succeeds");
    let err = h
        .service
        .start(booking.id, h.servicer)
        .await
        .expect_err("no location report yet");
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[rstest]
#[tokio::test]
async fn resend_is_rate_limited_inside_the_cooldown() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let err = h
        .service
        .resend_otp(booking.id, h.customer)
        .await
        .expect_err("cooldown applies");
    assert_eq!(err.code(), ErrorCode::RateLimited);
}

#[rstest]
#[tokio::test]
async fn wallet_bookings_require_funds_at_creation() {
    let h = harness();
    let err = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Wallet))
        .await
        .expect_err("empty wallet");
    assert_eq!(err.code(), ErrorCode::InsufficientBalance);

    let topup = crate::domain::ledger::topup_posting(
        h.customer,
        Money::from_minor(200_000),
        Currency::new("inr"),
        chrono::Utc::now(),
    )
    .expect("topup posting");
    crate::domain::ports::LedgerRepository::append(&h.store, &topup)
        .await
        .expect("topup posts");
    h.service
        .create(h.customer, create_request(h.category, PaymentMethod::Wallet))
        .await
        .expect("funded wallet books");
}

#[rstest]
#[tokio::test]
async fn cash_settles_after_collection_attestation() {
    let h = harness();
    let booking = h
        .service
        .create(h.customer, create_request(h.category, PaymentMethod::Cash))
        .await
        .expect("create succeeds");
    let booking = h
        .service
        .accept(booking.id, h.servicer)
        .await
        .expect("accept succeeds");
    place_servicer_on_site(&h, &booking).await;
    let booking = h
        .service
        .start(booking.id, h.servicer)
        .await
        .expect("start succeeds");
    let code = h.sink.last_code().expect("code was issued");
    let booking = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("verification succeeds");
    assert_eq!(booking.payment_status, PaymentStatus::CashPending);

    let booking = h
        .service
        .cash_collected(booking.id, h.servicer)
        .await
        .expect("attestation succeeds");
    assert_eq!(booking.payment_status, PaymentStatus::Completed);
    let balance = crate::domain::ports::LedgerRepository::balance(
        &h.store,
        h.servicer,
        &Currency::new("inr"),
    )
    .await
    .expect("balance");
    assert_eq!(balance, Money::from_minor(85_000));
}

#[rstest]
#[tokio::test]
async fn rating_is_once_only_and_completed_only() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let err = h
        .service
        .rate(booking.id, h.customer, 5, None)
        .await
        .expect_err("not completed yet");
    assert_eq!(err.code(), ErrorCode::Validation);

    let code = h.sink.last_code().expect("code was issued");
    let booking = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("verification succeeds");
    let booking = h
        .service
        .rate(booking.id, h.customer, 4, Some("prompt and tidy".to_owned()))
        .await
        .expect("first rating lands");
    assert_eq!(booking.rating.as_ref().map(|r| r.stars), Some(4));
    let err = h
        .service
        .rate(booking.id, h.customer, 1, None)
        .await
        .expect_err("second rating is rejected");
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[rstest]
#[tokio::test]
async fn unknown_category_is_not_found() {
    let h = harness();
    let err = h
        .service
        .create(h.customer, create_request(Uuid::new_v4(), PaymentMethod::Cash))
        .await
        .expect_err("unknown category");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn promo_codes_resolve_server_side() {
    let h = harness();
    h.store.set_promo("WELCOME10", 1_000);
    let mut request = create_request(h.category, PaymentMethod::Cash);
    request.promo = Some("WELCOME10".to_owned());
    let booking = h
        .service
        .create(h.customer, request)
        .await
        .expect("promo applies");
    assert_eq!(booking.pricing.quoted_amount, Money::from_minor(90_000));

    let mut request = create_request(h.category, PaymentMethod::Cash);
    request.promo = Some("MADE-UP".to_owned());
    let err = h
        .service
        .create(h.customer, request)
        .await
        .expect_err("unknown codes are rejected");
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[rstest]
#[tokio::test]
async fn travel_distance_comes_from_the_dispatch_origin() {
    let h = harness();
    h.store.set_rate(
        h.category,
        CategoryRate {
            base_rate: Money::from_minor(100_000),
            per_km_rate: Money::from_minor(1_000),
            floor: Money::from_minor(20_000),
        },
    );
    let request = create_request(h.category, PaymentMethod::Cash);
    // About 5.6 km due south of the service address.
    h.store.set_dispatch_origin(
        h.category,
        GeoPoint {
            lat: request.location.point.lat - 0.05,
            lon: request.location.point.lon,
        },
    );
    let booking = h
        .service
        .create(h.customer, request)
        .await
        .expect("create succeeds");
    // Six started kilometres of travel on top of the base rate.
    assert_eq!(booking.pricing.quoted_amount, Money::from_minor(106_000));
}

#[rstest]
#[tokio::test]
async fn addresses_beyond_the_service_radius_are_rejected() {
    let h = harness();
    let request = create_request(h.category, PaymentMethod::Cash);
    // About 111 km away, well past the 50 km radius.
    h.store.set_dispatch_origin(
        h.category,
        GeoPoint {
            lat: request.location.point.lat - 1.0,
            lon: request.location.point.lon,
        },
    );
    let err = h
        .service
        .create(h.customer, request)
        .await
        .expect_err("out of range");
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[rstest]
#[case(chrono::TimeDelta::hours(1), 150_000)]
#[case(chrono::TimeDelta::hours(3), 125_000)]
#[case(chrono::TimeDelta::hours(48), 100_000)]
#[tokio::test]
async fn urgency_premiums_follow_the_requested_slot(
    #[case] lead: chrono::TimeDelta,
    #[case] quoted_minor: i64,
) {
    let h = harness();
    let mut request = create_request(h.category, PaymentMethod::Cash);
    request.scheduled_at = Some(chrono::Utc::now() + lead);
    let booking = h
        .service
        .create(h.customer, request)
        .await
        .expect("create succeeds");
    assert_eq!(
        booking.pricing.quoted_amount,
        Money::from_minor(quoted_minor)
    );
}

#[rstest]
#[tokio::test]
async fn admin_cancel_reaches_any_live_state() {
    let h = harness();
    let booking = start_card_booking(&h).await;
    let booking = h
        .service
        .admin_cancel(booking.id, "dispute resolved off-platform")
        .await
        .expect("admin cancels in-progress work");
    assert_eq!(booking.state, BookingState::Cancelled);
    let err = h
        .service
        .admin_cancel(booking.id, "again")
        .await
        .expect_err("terminal states stay terminal");
    assert_eq!(err.code(), ErrorCode::IllegalTransition);
}

#[rstest]
#[tokio::test]
async fn pending_refund_leaves_the_ledger_untouched() {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_authorize()
        .returning(|_| Ok("auth-1".to_owned()));
    gateway
        .expect_capture()
        .returning(|_, _| Ok("cap-1".to_owned()));
    gateway.expect_refund().returning(|_, _, _| {
        Ok(RefundStatus::Pending {
            refund_ref: "ref-1".to_owned(),
        })
    });
    let h = harness_with_gateway(Arc::new(gateway));
    let booking = start_card_booking(&h).await;
    let code = h.sink.last_code().expect("code was issued");
    let booking = h
        .service
        .verify_completion(booking.id, h.customer, &code)
        .await
        .expect("verification succeeds");

    let outcome = h.service.refund(booking.id).await.expect("refund accepted");
    assert_eq!(outcome, RefundOutcome::Pending);
    let entries = crate::domain::ports::LedgerRepository::entries_for_booking(
        &h.store, booking.id,
    )
    .await
    .expect("entries");
    assert_eq!(entries.len(), 3, "no reversal until the webhook confirms");
}
