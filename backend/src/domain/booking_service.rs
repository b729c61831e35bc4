//! The booking coordinator.
//!
//! Every mutation of a booking flows through this service. It owns the
//! operation ordering the state machine alone cannot express: payment
//! authorization before a booking exists, OTP issuance at service start,
//! settlement and ledger posting at completion, and compensation when a
//! step fails halfway.
//!
//! Concurrency: mutations take a per-booking async mutex (fast path inside
//! one process) and the store still enforces an optimistic version check,
//! so a competing writer in another process loses cleanly and the loser is
//! mapped to a domain error such as `AlreadyAssigned`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::booking::{
    Actor, Booking, BookingDraft, BookingState, PaymentMethod, PaymentStatus, Rating, Role,
    ServiceLocation,
};
use crate::domain::booking_service_support::{
    BookingLocks, RetryPolicy, map_booking_repository_error, map_category_repository_error,
    map_directory_error, map_ledger_repository_error, map_otp_repository_error,
    map_tracking_repository_error, with_deadline,
};
use crate::domain::ledger::{capture_posting, refund_posting};
use crate::domain::notifications::{NotificationEvent, NotificationKind};
use crate::domain::otp::{OtpPolicy, OtpRecord, generate_code};
use crate::domain::ports::{
    BookingRepository, BookingRepositoryError, CategoryRepository, ChargeRequest,
    LedgerRepository, LedgerRepositoryError, NotificationSink, OtpRepository, PaymentGateway,
    PaymentGatewayError, PromoRepository, TrackingRepository, UserDirectory,
};
use crate::domain::pricing::{
    PricingPolicy, QuoteInput, URGENCY_EMERGENCY_BPS, URGENCY_SAME_DAY_BPS, URGENCY_STANDARD_BPS,
    compute_quote,
};
use crate::domain::tracking::{TrackingPolicy, haversine_meters};
use crate::domain::{Error, ErrorCode};

/// Behavioural knobs for the coordinator.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub pricing: PricingPolicy,
    pub tracking: TrackingPolicy,
    pub otp: OtpPolicy,
    /// When true, cash bookings require collection attestation before the
    /// completion code is accepted; when false, attestation follows.
    pub cash_collected_before_verify: bool,
    /// Hard deadline for each mutating operation.
    pub operation_deadline: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy {
                platform_fee_bps: 1_500,
                max_service_radius_km: 50.0,
                currency: crate::domain::money::Currency::new("inr"),
            },
            tracking: TrackingPolicy::default(),
            otp: OtpPolicy::default(),
            cash_collected_before_verify: false,
            operation_deadline: Duration::from_secs(30),
        }
    }
}

/// Customer input to [`BookingService::create`].
///
/// Pricing inputs are deliberately absent: travel distance, urgency, and
/// promo discounts are resolved here, never taken from the client.
#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub category_id: Uuid,
    pub location: ServiceLocation,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub method: PaymentMethod,
    pub promo: Option<String>,
}

/// Outcome of a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// Entries posted and the payment marked refunded.
    Completed,
    /// The processor accepted the refund; confirmation arrives on the webhook.
    Pending,
    /// The payment was already refunded; nothing was posted.
    AlreadyRefunded,
}

/// Coordinates the booking lifecycle across stores and the payment rail.
#[derive(Clone)]
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn LedgerRepository>,
    otps: Arc<dyn OtpRepository>,
    tracking: Arc<dyn TrackingRepository>,
    categories: Arc<dyn CategoryRepository>,
    promos: Arc<dyn PromoRepository>,
    directory: Arc<dyn UserDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
    locks: BookingLocks,
    retry: RetryPolicy,
}

pub struct BookingServiceDeps {
    pub bookings: Arc<dyn BookingRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub otps: Arc<dyn OtpRepository>,
    pub tracking: Arc<dyn TrackingRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub promos: Arc<dyn PromoRepository>,
    pub directory: Arc<dyn UserDirectory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(deps: BookingServiceDeps, policy: BookingPolicy) -> Self {
        Self {
            bookings: deps.bookings,
            ledger: deps.ledger,
            otps: deps.otps,
            tracking: deps.tracking,
            categories: deps.categories,
            promos: deps.promos,
            directory: deps.directory,
            gateway: deps.gateway,
            notifier: deps.notifier,
            clock: deps.clock,
            policy,
            locks: BookingLocks::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Quote, authorize (card), persist, and announce a new booking.
    pub async fn create(
        &self,
        customer_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking, Error> {
        with_deadline(
            self.policy.operation_deadline,
            self.create_inner(customer_id, request),
        )
        .await
    }

    async fn create_inner(
        &self,
        customer_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking, Error> {
        let rate = self
            .categories
            .rate_of(request.category_id)
            .await
            .map_err(map_category_repository_error)?
            .ok_or_else(|| Error::not_found("unknown service category"))?;
        let now = self.clock.utc();
        let distance_km = match self
            .categories
            .dispatch_origin(request.category_id)
            .await
            .map_err(map_category_repository_error)?
        {
            Some(origin) => haversine_meters(origin, request.location.point) / 1_000.0,
            None => 0.0,
        };
        let promo_discount_bps = match &request.promo {
            Some(code) => self
                .promos
                .discount_of(code)
                .await
                .map_err(map_promo_repository_error)?
                .ok_or_else(|| Error::validation("unknown or expired promo code"))?,
            None => 0,
        };
        let quote = compute_quote(
            &QuoteInput {
                rate,
                distance_km,
                urgency_bps: urgency_for(request.scheduled_at, now),
                promo_discount_bps,
            },
            &self.policy.pricing,
        )?;

        let mut booking = Booking::create(
            BookingDraft {
                id: Uuid::new_v4(),
                customer_id,
                category_id: request.category_id,
                location: request.location,
                scheduled_at: request.scheduled_at,
                pricing: crate::domain::booking::PricingSnapshot {
                    quoted_amount: quote.quoted_amount,
                    platform_fee: quote.platform_fee,
                    servicer_earning: quote.servicer_earning,
                    currency: self.policy.pricing.currency.clone(),
                },
                method: request.method,
            },
            now,
        );

        match request.method {
            PaymentMethod::Card => {
                let charge = ChargeRequest {
                    booking_id: booking.id,
                    amount: booking.pricing.quoted_amount,
                    currency: booking.pricing.currency.clone(),
                    idempotency_key: format!("auth-{}", booking.id.simple()),
                };
                let auth_ref = self
                    .retry
                    .run(
                        || self.gateway.authorize(&charge),
                        PaymentGatewayError::is_transient,
                    )
                    .await
                    .map_err(map_gateway_error)?;
                booking.payment_status = PaymentStatus::Authorized;
                booking.payment_ref = Some(auth_ref);
            }
            PaymentMethod::Wallet => {
                let balance = self
                    .ledger
                    .balance(customer_id, &booking.pricing.currency)
                    .await
                    .map_err(map_ledger_repository_error)?;
                if balance < booking.pricing.quoted_amount {
                    return Err(Error::new(
                        ErrorCode::InsufficientBalance,
                        "wallet balance does not cover the quote",
                    ));
                }
            }
            PaymentMethod::Cash => {}
        }

        self.retry
            .run(
                || self.bookings.insert(&booking),
                BookingRepositoryError::is_transient,
            )
            .await
            .map_err(map_booking_repository_error)?;
        info!(booking_id = %booking.id, "booking created");

        let servicers = self
            .directory
            .servicers_in_category(booking.category_id)
            .await
            .map_err(map_directory_error)?;
        self.announce(
            NotificationKind::BookingCreated,
            servicers,
            &booking,
            serde_json::json!({
                "categoryId": booking.category_id,
                "quotedAmount": booking.pricing.quoted_amount,
            }),
        )
        .await;
        Ok(booking)
    }

    /// First servicer wins; losers get `AlreadyAssigned`.
    pub async fn accept(&self, booking_id: Uuid, servicer_id: Uuid) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.state != BookingState::Pending {
                return Err(assignment_race_error(&booking));
            }
            let now = self.clock.utc();
            booking.servicer_id = Some(servicer_id);
            booking.transition(BookingState::Accepted, Actor::Servicer, None, now)?;
            let booking = self.store_update(booking).await.map_err(|error| {
                if error.code() == ErrorCode::Internal {
                    error
                } else {
                    Error::new(
                        ErrorCode::AlreadyAssigned,
                        "another servicer accepted this booking first",
                    )
                }
            })?;
            self.announce(
                NotificationKind::BookingAccepted,
                vec![booking.customer_id],
                &booking,
                serde_json::json!({ "servicerId": servicer_id }),
            )
            .await;
            Ok(booking)
        })
        .await
    }

    /// Pin a time slot on an accepted booking.
    pub async fn schedule(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load_for_participant(booking_id, user_id, role).await?;
            let now = self.clock.utc();
            if at <= now {
                return Err(Error::validation("scheduled time must be in the future"));
            }
            booking.transition(BookingState::Scheduled, role.as_actor(), None, now)?;
            booking.scheduled_at = Some(at);
            let booking = self.store_update(booking).await?;
            self.announce(
                NotificationKind::BookingScheduled,
                booking.participants(),
                &booking,
                serde_json::json!({ "scheduledAt": at }),
            )
            .await;
            Ok(booking)
        })
        .await
    }

    /// Start the service: location gate, OTP issuance, then `in_progress`.
    pub async fn start(&self, booking_id: Uuid, servicer_id: Uuid) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.servicer_id != Some(servicer_id) {
                return Err(Error::forbidden("only the assigned servicer can start"));
            }
            self.check_servicer_on_site(&booking).await?;

            let now = self.clock.utc();
            let code = generate_code(&mut rand::thread_rng(), self.policy.otp.length);
            let record = OtpRecord::issue(booking.id, &code, now, &self.policy.otp);
            self.otps
                .upsert(&record)
                .await
                .map_err(map_otp_repository_error)?;
            booking.completion_otp_id = Some(record.id);
            booking.transition(BookingState::InProgress, Actor::Servicer, None, now)?;
            let booking = self.store_update(booking).await?;

            self.announce(
                NotificationKind::OtpIssued,
                vec![booking.customer_id],
                &booking,
                serde_json::json!({ "code": code }),
            )
            .await;
            self.announce(
                NotificationKind::BookingStarted,
                booking.participants(),
                &booking,
                serde_json::Value::Null,
            )
            .await;
            Ok(booking)
        })
        .await
    }

    /// Re-send the completion code, superseding the active one.
    pub async fn resend_otp(&self, booking_id: Uuid, customer_id: Uuid) -> Result<(), Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let booking = self.load(booking_id).await?;
            if booking.customer_id != customer_id {
                return Err(Error::forbidden("only the customer can request a resend"));
            }
            if booking.state != BookingState::InProgress {
                return Err(Error::new(
                    ErrorCode::NoActiveOtp,
                    "the booking is not in progress",
                ));
            }
            let now = self.clock.utc();
            let existing = self
                .otps
                .find_for_booking(booking_id)
                .await
                .map_err(map_otp_repository_error)?;
            if let Some(existing) = existing {
                if !existing.cooldown_over(now, &self.policy.otp) {
                    return Err(Error::rate_limited(
                        "wait a minute before requesting another code",
                    ));
                }
            }
            let code = generate_code(&mut rand::thread_rng(), self.policy.otp.length);
            let record = OtpRecord::issue(booking_id, &code, now, &self.policy.otp);
            self.otps
                .upsert(&record)
                .await
                .map_err(map_otp_repository_error)?;
            self.announce(
                NotificationKind::OtpIssued,
                vec![booking.customer_id],
                &booking,
                serde_json::json!({ "code": code }),
            )
            .await;
            Ok(())
        })
        .await
    }

    /// Verify the completion code and settle the payment.
    ///
    /// Completion is final once the code matches: a capture failure marks
    /// the payment `failed` for reconciliation instead of reverting the
    /// booking. Re-submitting the already-consumed code after completion
    /// succeeds without touching the ledger again.
    pub async fn verify_completion(
        &self,
        booking_id: Uuid,
        customer_id: Uuid,
        code: &str,
    ) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.customer_id != customer_id {
                return Err(Error::forbidden(
                    "only the customer can verify completion",
                ));
            }
            if booking.state == BookingState::Completed {
                return self.reverify_consumed_code(booking, code).await;
            }
            if booking.state != BookingState::InProgress {
                return Err(Error::illegal_transition("the booking is not in progress"));
            }
            if booking.method == PaymentMethod::Cash
                && self.policy.cash_collected_before_verify
                && booking.cash_collected_at.is_none()
            {
                return Err(Error::validation(
                    "attest cash collection before verifying the code",
                ));
            }

            let now = self.clock.utc();
            let mut record = self
                .otps
                .find_for_booking(booking_id)
                .await
                .map_err(map_otp_repository_error)?
                .filter(|record| record.is_active(now))
                .ok_or_else(|| {
                    Error::new(ErrorCode::NoActiveOtp, "no active completion code")
                })?;
            let verdict = record.verify(code, now, &self.policy.otp);
            // Attempt counters and lockouts must survive even when the
            // verification itself failed.
            self.otps
                .upsert(&record)
                .await
                .map_err(map_otp_repository_error)?;
            verdict?;

            booking.transition(BookingState::Completed, Actor::System, None, now)?;
            self.settle(&mut booking, now).await?;
            let booking = self.store_update(booking).await?;

            self.announce(
                NotificationKind::BookingCompleted,
                booking.participants(),
                &booking,
                serde_json::json!({ "completedAt": booking.completed_at }),
            )
            .await;
            if booking.payment_status == PaymentStatus::Completed {
                self.announce(
                    NotificationKind::PaymentReceipt,
                    vec![booking.customer_id],
                    &booking,
                    serde_json::json!({ "amount": booking.pricing.quoted_amount }),
                )
                .await;
            }
            Ok(booking)
        })
        .await
    }

    /// A completed booking accepts its consumed code again without
    /// re-settling; anything else is a transition error.
    async fn reverify_consumed_code(
        &self,
        booking: Booking,
        code: &str,
    ) -> Result<Booking, Error> {
        let consumed = self
            .otps
            .find_for_booking(booking.id)
            .await
            .map_err(map_otp_repository_error)?
            .filter(|record| record.verified_at.is_some() && record.matches(code));
        match consumed {
            Some(_) => Ok(booking),
            None => Err(Error::illegal_transition("the booking is already completed")),
        }
    }

    /// Attest that cash changed hands on a completed cash booking.
    pub async fn cash_collected(
        &self,
        booking_id: Uuid,
        servicer_id: Uuid,
    ) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.servicer_id != Some(servicer_id) {
                return Err(Error::forbidden(
                    "only the assigned servicer can attest collection",
                ));
            }
            if booking.method != PaymentMethod::Cash {
                return Err(Error::validation("not a cash booking"));
            }
            if booking.cash_collected_at.is_some() {
                return Ok(booking);
            }
            let collectable = matches!(
                booking.payment_status,
                PaymentStatus::CashPending | PaymentStatus::Pending
            );
            if !collectable {
                return Err(Error::illegal_transition(
                    "cash was already settled for this booking",
                ));
            }
            let now = self.clock.utc();
            booking.cash_collected_at = Some(now);
            // Before completion the attestation is just recorded; the ledger
            // posting happens when the code verifies.
            if booking.state == BookingState::Completed {
                let entries =
                    capture_posting(&booking, now)?;
                self.append_ledger(&entries).await?;
                booking.payment_status = PaymentStatus::Completed;
            }
            booking.updated_at = now;
            let booking = self.store_update(booking).await?;
            self.announce(
                NotificationKind::CashCollected,
                booking.participants(),
                &booking,
                serde_json::json!({ "amount": booking.pricing.quoted_amount }),
            )
            .await;
            Ok(booking)
        })
        .await
    }

    /// Customer cancellation: direct before acceptance, two-step after.
    pub async fn request_cancel(
        &self,
        booking_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.customer_id != customer_id {
                return Err(Error::forbidden("only the customer can cancel"));
            }
            let now = self.clock.utc();
            match booking.state {
                BookingState::Pending => {
                    booking.transition(BookingState::Cancelled, Actor::Customer, None, now)?;
                }
                BookingState::Accepted | BookingState::Scheduled => {
                    booking.transition(
                        BookingState::CancelRequested,
                        Actor::Customer,
                        None,
                        now,
                    )?;
                }
                BookingState::InProgress | BookingState::Completed => {
                    return Err(Error::new(
                        ErrorCode::TooLateToCancel,
                        "the service already started",
                    ));
                }
                BookingState::CancelRequested | BookingState::Cancelled => {
                    return Err(Error::illegal_transition(
                        "cancellation is already underway",
                    ));
                }
            }
            let booking = self.store_update(booking).await?;
            let (kind, recipients) = if booking.state == BookingState::Cancelled {
                (NotificationKind::BookingCancelled, booking.participants())
            } else {
                (
                    NotificationKind::CancelRequested,
                    booking.servicer_id.into_iter().collect(),
                )
            };
            self.announce(kind, recipients, &booking, serde_json::Value::Null)
                .await;
            Ok(booking)
        })
        .await
    }

    /// Servicer acknowledges a pending cancellation.
    pub async fn confirm_cancel(
        &self,
        booking_id: Uuid,
        servicer_id: Uuid,
    ) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.servicer_id != Some(servicer_id) {
                return Err(Error::forbidden(
                    "only the assigned servicer can confirm cancellation",
                ));
            }
            let now = self.clock.utc();
            booking.transition(BookingState::Cancelled, Actor::Servicer, None, now)?;
            let booking = self.store_update(booking).await?;
            self.announce(
                NotificationKind::BookingCancelled,
                booking.participants(),
                &booking,
                serde_json::Value::Null,
            )
            .await;
            Ok(booking)
        })
        .await
    }

    /// Administrative cancellation of any non-terminal booking.
    pub async fn admin_cancel(
        &self,
        booking_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<Booking, Error> {
        let reason = reason.into();
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            let now = self.clock.utc();
            booking.transition(BookingState::Cancelled, Actor::Admin, Some(reason), now)?;
            let booking = self.store_update(booking).await?;
            self.announce(
                NotificationKind::BookingCancelled,
                booking.participants(),
                &booking,
                serde_json::Value::Null,
            )
            .await;
            Ok(booking)
        })
        .await
    }

    /// Refund a captured payment, idempotently.
    ///
    /// Re-running a refund that already posted returns
    /// [`RefundOutcome::AlreadyRefunded`] without touching the ledger.
    pub async fn refund(&self, booking_id: Uuid) -> Result<RefundOutcome, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            match booking.payment_status {
                PaymentStatus::Refunded => return Ok(RefundOutcome::AlreadyRefunded),
                PaymentStatus::Completed => {}
                _ => {
                    return Err(Error::validation(
                        "only captured payments can be refunded",
                    ));
                }
            }
            let now = self.clock.utc();
            let outcome = match booking.method {
                PaymentMethod::Card => {
                    let capture_ref = booking
                        .payment_ref
                        .clone()
                        .ok_or_else(|| Error::internal("captured booking has no payment ref"))?;
                    let idempotency_key = format!("refund-{}", booking.id.simple());
                    let status = self
                        .retry
                        .run(
                            || {
                                self.gateway.refund(
                                    &capture_ref,
                                    booking.pricing.quoted_amount,
                                    &idempotency_key,
                                )
                            },
                            PaymentGatewayError::is_transient,
                        )
                        .await
                        .map_err(map_gateway_error)?;
                    match status {
                        crate::domain::ports::RefundStatus::Completed { .. } => {
                            RefundOutcome::Completed
                        }
                        crate::domain::ports::RefundStatus::Pending { .. } => {
                            RefundOutcome::Pending
                        }
                    }
                }
                PaymentMethod::Cash | PaymentMethod::Wallet => RefundOutcome::Completed,
            };
            if outcome == RefundOutcome::Completed {
                let originals = self
                    .ledger
                    .entries_for_booking(booking_id)
                    .await
                    .map_err(map_ledger_repository_error)?;
                let captured: Vec<_> = originals
                    .iter()
                    .filter(|entry| entry.reversal_of.is_none())
                    .cloned()
                    .collect();
                let reversals = refund_posting(&captured, now)?;
                self.append_ledger(&reversals).await?;
                booking.payment_status = PaymentStatus::Refunded;
                booking.updated_at = now;
                self.store_update(booking).await?;
            }
            Ok(outcome)
        })
        .await
    }

    /// Apply a processor-confirmed refund without calling the gateway.
    ///
    /// Used by the webhook handler when an earlier refund settled
    /// asynchronously. Idempotent: an already-refunded booking is a no-op.
    pub async fn confirm_refund(&self, booking_id: Uuid) -> Result<RefundOutcome, Error> {
        let _guard = self.locks.acquire(booking_id).await;
        let mut booking = self.load(booking_id).await?;
        match booking.payment_status {
            PaymentStatus::Refunded => return Ok(RefundOutcome::AlreadyRefunded),
            PaymentStatus::Completed => {}
            _ => {
                return Err(Error::validation(
                    "refund confirmation for an uncaptured payment",
                ));
            }
        }
        let now = self.clock.utc();
        let originals = self
            .ledger
            .entries_for_booking(booking_id)
            .await
            .map_err(map_ledger_repository_error)?;
        let captured: Vec<_> = originals
            .iter()
            .filter(|entry| entry.reversal_of.is_none())
            .cloned()
            .collect();
        let reversals = refund_posting(&captured, now)?;
        self.append_ledger(&reversals).await?;
        booking.payment_status = PaymentStatus::Refunded;
        booking.updated_at = now;
        self.store_update(booking).await?;
        Ok(RefundOutcome::Completed)
    }

    /// Reconcile a capture the processor confirmed after a local failure.
    ///
    /// Idempotent: a payment already marked completed is a no-op.
    pub async fn confirm_capture(
        &self,
        booking_id: Uuid,
        capture_ref: &str,
    ) -> Result<Booking, Error> {
        let _guard = self.locks.acquire(booking_id).await;
        let mut booking = self.load(booking_id).await?;
        if booking.payment_status == PaymentStatus::Completed {
            return Ok(booking);
        }
        if booking.state != BookingState::Completed {
            return Err(Error::validation(
                "capture confirmation for an incomplete booking",
            ));
        }
        let now = self.clock.utc();
        let entries = capture_posting(&booking, now)?;
        self.append_ledger(&entries).await?;
        booking.payment_status = PaymentStatus::Completed;
        booking.payment_ref = Some(capture_ref.to_owned());
        booking.updated_at = now;
        let booking = self.store_update(booking).await?;
        self.announce(
            NotificationKind::PaymentReceipt,
            vec![booking.customer_id],
            &booking,
            serde_json::json!({ "amount": booking.pricing.quoted_amount }),
        )
        .await;
        Ok(booking)
    }

    /// Flag a capture the processor reported as failed.
    ///
    /// Leaves the booking for manual reconciliation rather than reversing
    /// anything. Idempotent: an already-flagged payment is a no-op.
    pub async fn flag_capture_failed(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, Error> {
        let _guard = self.locks.acquire(booking_id).await;
        let mut booking = self.load(booking_id).await?;
        match booking.payment_status {
            PaymentStatus::Failed => return Ok(booking),
            PaymentStatus::Completed | PaymentStatus::Refunded => {
                return Err(Error::validation(
                    "failure report for an already settled payment",
                ));
            }
            _ => {}
        }
        booking.payment_status = PaymentStatus::Failed;
        booking.updated_at = self.clock.utc();
        let booking = self.store_update(booking).await?;
        self.announce(
            NotificationKind::PaymentFailed,
            vec![booking.customer_id],
            &booking,
            serde_json::json!({ "reason": reason }),
        )
        .await;
        Ok(booking)
    }

    /// Record the customer's one-time rating of a completed booking.
    pub async fn rate(
        &self,
        booking_id: Uuid,
        customer_id: Uuid,
        stars: u8,
        text: Option<String>,
    ) -> Result<Booking, Error> {
        with_deadline(self.policy.operation_deadline, async {
            let _guard = self.locks.acquire(booking_id).await;
            let mut booking = self.load(booking_id).await?;
            if booking.customer_id != customer_id {
                return Err(Error::forbidden("only the customer can rate"));
            }
            if booking.state != BookingState::Completed {
                return Err(Error::validation("only completed bookings can be rated"));
            }
            if booking.rating.is_some() {
                return Err(Error::validation("this booking was already rated"));
            }
            booking.rating = Some(Rating::new(stars, text)?);
            booking.updated_at = self.clock.utc();
            self.store_update(booking).await
        })
        .await
    }

    /// Fetch one booking, enforcing participant visibility.
    pub async fn get(&self, booking_id: Uuid, user_id: Uuid, role: Role) -> Result<Booking, Error> {
        let booking = self.load(booking_id).await?;
        if role != Role::Admin && !booking.is_participant(user_id) {
            return Err(Error::forbidden("not a participant of this booking"));
        }
        Ok(booking)
    }

    /// All bookings the user participates in.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, Error> {
        self.retry
            .run(
                || self.bookings.list_for_user(user_id),
                BookingRepositoryError::is_transient,
            )
            .await
            .map_err(map_booking_repository_error)
    }

    /// Open pending bookings a servicer could accept.
    pub async fn list_open_in_category(&self, category_id: Uuid) -> Result<Vec<Booking>, Error> {
        self.retry
            .run(
                || self.bookings.list_open_in_category(category_id),
                BookingRepositoryError::is_transient,
            )
            .await
            .map_err(map_booking_repository_error)
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking, Error> {
        self.retry
            .run(
                || self.bookings.find_by_id(booking_id),
                BookingRepositoryError::is_transient,
            )
            .await
            .map_err(map_booking_repository_error)?
            .ok_or_else(|| Error::not_found("no such booking"))
    }

    async fn load_for_participant(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Booking, Error> {
        let booking = self.load(booking_id).await?;
        if role != Role::Admin && !booking.is_participant(user_id) {
            return Err(Error::forbidden("not a participant of this booking"));
        }
        Ok(booking)
    }

    /// Compare-and-set write; the version bump happens here.
    async fn store_update(&self, mut booking: Booking) -> Result<Booking, Error> {
        let expected = booking.version;
        booking.version += 1;
        self.retry
            .run(
                || self.bookings.update(&booking, expected),
                BookingRepositoryError::is_transient,
            )
            .await
            .map_err(|error| match error {
                BookingRepositoryError::VersionConflict { message, version } => Error::new(
                    ErrorCode::IllegalTransition,
                    format!("booking changed concurrently at v{version}: {message}"),
                ),
                other => map_booking_repository_error(other),
            })?;
        Ok(booking)
    }

    /// The location gate for `start`: the servicer's last report must be
    /// within the arrival radius of the service location.
    async fn check_servicer_on_site(&self, booking: &Booking) -> Result<(), Error> {
        let progress = self
            .tracking
            .load_progress(booking.id)
            .await
            .map_err(map_tracking_repository_error)?;
        if progress.is_some_and(|p| p.has_arrived()) {
            return Ok(());
        }
        let sample = self
            .tracking
            .latest_sample(booking.id)
            .await
            .map_err(map_tracking_repository_error)?;
        let on_site = sample.is_some_and(|sample| {
            haversine_meters(sample.point, booking.location.point)
                <= self.policy.tracking.arrival_radius_meters
        });
        if on_site {
            Ok(())
        } else {
            Err(Error::validation(
                "the servicer is not at the service location",
            ))
        }
    }

    /// Post-completion settlement per payment method.
    async fn settle(&self, booking: &mut Booking, now: DateTime<Utc>) -> Result<(), Error> {
        match booking.method {
            PaymentMethod::Card => {
                let auth_ref = booking
                    .payment_ref
                    .clone()
                    .ok_or_else(|| Error::internal("authorized booking has no payment ref"))?;
                let idempotency_key = format!("cap-{}", booking.id.simple());
                let captured = self
                    .retry
                    .run(
                        || self.gateway.capture(&auth_ref, &idempotency_key),
                        PaymentGatewayError::is_transient,
                    )
                    .await;
                match captured {
                    Ok(capture_ref) => {
                        booking.payment_ref = Some(capture_ref);
                        let entries = capture_posting(booking, now)?;
                        self.append_ledger(&entries).await?;
                        booking.payment_status = PaymentStatus::Completed;
                    }
                    Err(error) => {
                        warn!(booking_id = %booking.id, %error, "capture failed after completion");
                        booking.payment_status = PaymentStatus::Failed;
                        self.announce(
                            NotificationKind::PaymentFailed,
                            vec![booking.customer_id],
                            booking,
                            serde_json::json!({ "reason": error.to_string() }),
                        )
                        .await;
                    }
                }
            }
            PaymentMethod::Wallet => {
                let balance = self
                    .ledger
                    .balance(booking.customer_id, &booking.pricing.currency)
                    .await
                    .map_err(map_ledger_repository_error)?;
                if balance < booking.pricing.quoted_amount {
                    booking.payment_status = PaymentStatus::Failed;
                    self.announce(
                        NotificationKind::PaymentFailed,
                        vec![booking.customer_id],
                        booking,
                        serde_json::json!({ "reason": "insufficient wallet balance" }),
                    )
                    .await;
                    return Ok(());
                }
                let entries = capture_posting(booking, now)?;
                self.append_ledger(&entries).await?;
                booking.payment_status = PaymentStatus::Completed;
            }
            PaymentMethod::Cash => {
                if booking.cash_collected_at.is_some() {
                    let entries = capture_posting(booking, now)?;
                    self.append_ledger(&entries).await?;
                    booking.payment_status = PaymentStatus::Completed;
                } else {
                    booking.payment_status = PaymentStatus::CashPending;
                }
            }
        }
        Ok(())
    }

    async fn append_ledger(
        &self,
        entries: &[crate::domain::ledger::LedgerEntry],
    ) -> Result<(), Error> {
        self.retry
            .run(
                || self.ledger.append(entries),
                |error| matches!(error, LedgerRepositoryError::Connection { .. }),
            )
            .await
            .map_err(map_ledger_repository_error)
    }

    /// Best-effort event emission; failures are logged, never surfaced.
    async fn announce(
        &self,
        kind: NotificationKind,
        recipients: Vec<Uuid>,
        booking: &Booking,
        payload: serde_json::Value,
    ) {
        if recipients.is_empty() {
            return;
        }
        let event = NotificationEvent::new(
            kind,
            recipients,
            Some(booking.id),
            payload,
            self.clock.utc(),
        );
        if let Err(error) = self.notifier.publish(&event).await {
            warn!(booking_id = %booking.id, %error, "notification publish failed");
        }
    }
}

fn assignment_race_error(booking: &Booking) -> Error {
    if booking.servicer_id.is_some() && !booking.state.is_terminal() {
        Error::new(
            ErrorCode::AlreadyAssigned,
            "another servicer accepted this booking first",
        )
    } else {
        Error::illegal_transition("the booking is no longer pending")
    }
}

/// Urgency premium from the requested slot.
///
/// A slot within two hours is an emergency callout, within a day a
/// same-day one. Unscheduled bookings queue for the next free servicer and
/// carry no premium.
fn urgency_for(scheduled_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    let Some(at) = scheduled_at else {
        return URGENCY_STANDARD_BPS;
    };
    let lead = at - now;
    if lead <= chrono::TimeDelta::hours(2) {
        URGENCY_EMERGENCY_BPS
    } else if lead <= chrono::TimeDelta::hours(24) {
        URGENCY_SAME_DAY_BPS
    } else {
        URGENCY_STANDARD_BPS
    }
}

fn map_promo_repository_error(error: crate::domain::ports::PromoRepositoryError) -> Error {
    Error::internal(format!("promo repository error: {error}"))
}

fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::Declined { message } => {
            Error::new(ErrorCode::PaymentDeclined, message)
        }
        PaymentGatewayError::Unavailable { message } => {
            Error::timeout(format!("payment processor unavailable: {message}"))
        }
        PaymentGatewayError::Protocol { message } => {
            Error::internal(format!("payment processor protocol error: {message}"))
        }
    }
}

#[cfg(test)]
#[path = "booking_service_tests.rs"]
mod tests;
