//! Booking lifecycle HTTP handlers.
//!
//! ```text
//! POST /api/v1/bookings                        Create a booking
//! GET  /api/v1/bookings                        List the caller's bookings
//! GET  /api/v1/bookings/open                   Open bookings in a category
//! GET  /api/v1/bookings/{id}                   Fetch one booking
//! POST /api/v1/bookings/{id}/accept            Servicer claims the booking
//! POST /api/v1/bookings/{id}/schedule          Agree a future slot
//! POST /api/v1/bookings/{id}/start             Begin work on site
//! POST /api/v1/bookings/{id}/verify-otp        Complete via the customer's code
//! POST /api/v1/bookings/{id}/otp/resend        Re-send the completion code
//! POST /api/v1/bookings/{id}/cancel            Cancel; behaviour depends on role
//! POST /api/v1/bookings/{id}/cash-collected    Servicer attests cash receipt
//! POST /api/v1/bookings/{id}/rate              Customer rates the job
//! POST /api/v1/bookings/{id}/refund            Admin triggers a refund
//! ```

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingState, CreateBookingRequest, Error, GeoPoint, PaymentMethod, PaymentStatus,
    RefundOutcome, Role, ServiceLocation, StateChange,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// A service address with its coordinates.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationBody {
    pub lat: f64,
    pub lon: f64,
    pub address: String,
}

impl LocationBody {
    fn into_domain(self) -> ServiceLocation {
        ServiceLocation {
            point: GeoPoint {
                lat: self.lat,
                lon: self.lon,
            },
            address: self.address,
        }
    }

    fn from_domain(location: &ServiceLocation) -> Self {
        Self {
            lat: location.point.lat,
            lon: location.point.lon,
            address: location.address.clone(),
        }
    }
}

/// Request payload for creating a booking.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    #[schema(format = "uuid")]
    pub category_id: Uuid,
    pub location: LocationBody,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// One of `card`, `wallet`, or `cash`.
    #[schema(value_type = String)]
    pub method: PaymentMethod,
    /// Promo code to apply; validated server-side.
    pub promo: Option<String>,
}

/// Pricing captured on the booking at quote time.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingBody {
    /// Minor units (e.g. paise).
    pub quoted_amount: i64,
    pub platform_fee: i64,
    pub servicer_earning: i64,
    pub currency: String,
}

/// One entry of the booking's state history.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeBody {
    #[schema(value_type = String)]
    pub state: BookingState,
    #[schema(value_type = String, format = "date-time")]
    pub at: DateTime<Utc>,
    pub by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StateChangeBody {
    fn from_domain(change: &StateChange) -> Self {
        Self {
            state: change.state,
            at: change.at,
            by: format!("{:?}", change.by).to_lowercase(),
            reason: change.reason.clone(),
        }
    }
}

/// Response payload for a booking.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    #[schema(format = "uuid")]
    pub id: Uuid,
    #[schema(format = "uuid")]
    pub customer_id: Uuid,
    #[schema(format = "uuid")]
    pub servicer_id: Option<Uuid>,
    #[schema(format = "uuid")]
    pub category_id: Uuid,
    pub location: LocationBody,
    #[schema(value_type = String, format = "date-time")]
    pub requested_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub pricing: PricingBody,
    #[schema(value_type = String)]
    pub method: PaymentMethod,
    #[schema(value_type = String)]
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[schema(value_type = String)]
    pub state: BookingState,
    pub state_history: Vec<StateChangeBody>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub cash_collected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingBody>,
    pub version: u64,
}

/// A customer's rating of a completed job.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingBody {
    /// 1 to 5.
    pub stars: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            customer_id: booking.customer_id,
            servicer_id: booking.servicer_id,
            category_id: booking.category_id,
            location: LocationBody::from_domain(&booking.location),
            requested_at: booking.requested_at,
            scheduled_at: booking.scheduled_at,
            pricing: PricingBody {
                quoted_amount: booking.pricing.quoted_amount.minor(),
                platform_fee: booking.pricing.platform_fee.minor(),
                servicer_earning: booking.pricing.servicer_earning.minor(),
                currency: booking.pricing.currency.as_str().to_owned(),
            },
            method: booking.method,
            payment_status: booking.payment_status,
            payment_ref: booking.payment_ref,
            state: booking.state,
            state_history: booking
                .state_history
                .iter()
                .map(StateChangeBody::from_domain)
                .collect(),
            completed_at: booking.completed_at,
            cancelled_at: booking.cancelled_at,
            cash_collected_at: booking.cash_collected_at,
            rating: booking.rating.map(|rating| RatingBody {
                stars: rating.stars,
                text: rating.text,
            }),
            version: booking.version,
        }
    }
}

fn booking_json(booking: Booking) -> HttpResponse {
    HttpResponse::Ok().json(BookingResponse::from(booking))
}

/// Create a booking.
///
/// # Errors
///
/// - `400 Bad Request`: bad coordinates or the address is out of range.
/// - `402 Payment Required`: the card authorization was declined.
/// - `404 Not Found`: unknown category.
/// - `422 Unprocessable Entity`: wallet balance cannot cover the quote.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingBody,
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 402, description = "Card declined", body = Error),
        (status = 404, description = "Unknown category", body = Error),
        (status = 422, description = "Insufficient wallet balance", body = Error)
    ),
    tags = ["bookings"],
    operation_id = "createBooking"
)]
#[post("/bookings")]
pub async fn create_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreateBookingBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Customer)?;
    let payload = payload.into_inner();
    let booking = state
        .bookings
        .create(
            identity.user_id,
            CreateBookingRequest {
                category_id: payload.category_id,
                location: payload.location.into_domain(),
                scheduled_at: payload.scheduled_at,
                method: payload.method,
                promo: payload.promo,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(BookingResponse::from(booking)))
}

/// List the caller's bookings, oldest first.
#[get("/bookings")]
pub async fn list_bookings(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let bookings = state.bookings.list_for_user(identity.user_id).await?;
    let bodies: Vec<BookingResponse> = bookings.into_iter().map(BookingResponse::from).collect();
    Ok(HttpResponse::Ok().json(bodies))
}

/// Query string for the open-bookings feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBookingsQuery {
    pub category_id: Uuid,
}

/// Unassigned bookings a servicer can claim.
#[get("/bookings/open")]
pub async fn open_bookings(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<OpenBookingsQuery>,
) -> ApiResult<HttpResponse> {
    session.require_role(Role::Servicer)?;
    let bookings = state
        .bookings
        .list_open_in_category(query.category_id)
        .await?;
    let bodies: Vec<BookingResponse> = bookings.into_iter().map(BookingResponse::from).collect();
    Ok(HttpResponse::Ok().json(bodies))
}

/// Fetch one booking; participants and admins only.
#[get("/bookings/{id}")]
pub async fn get_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let booking = state
        .bookings
        .get(path.into_inner(), identity.user_id, identity.role)
        .await?;
    Ok(booking_json(booking))
}

/// Servicer claims an open booking. First accept wins.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/accept",
    responses(
        (status = 200, description = "Booking assigned", body = BookingResponse),
        (status = 409, description = "Already assigned", body = Error)
    ),
    params(("id" = Uuid, Path, description = "Booking id")),
    tags = ["bookings"],
    operation_id = "acceptBooking"
)]
#[post("/bookings/{id}/accept")]
pub async fn accept_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Servicer)?;
    let booking = state
        .bookings
        .accept(path.into_inner(), identity.user_id)
        .await?;
    Ok(booking_json(booking))
}

/// Request payload for scheduling.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    #[schema(value_type = String, format = "date-time")]
    pub at: DateTime<Utc>,
}

/// Agree a future service slot.
#[post("/bookings/{id}/schedule")]
pub async fn schedule_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: web::Json<ScheduleBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let booking = state
        .bookings
        .schedule(
            path.into_inner(),
            identity.user_id,
            identity.role,
            payload.at,
        )
        .await?;
    Ok(booking_json(booking))
}

/// Servicer starts work; issues the completion code to the customer.
#[post("/bookings/{id}/start")]
pub async fn start_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Servicer)?;
    let booking = state
        .bookings
        .start(path.into_inner(), identity.user_id)
        .await?;
    Ok(booking_json(booking))
}

/// Request payload for OTP verification.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpBody {
    pub code: String,
}

/// Customer submits the completion code, settling the booking.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: wrong or expired code.
/// - `423 Locked`: too many failed attempts.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/verify-otp",
    request_body = VerifyOtpBody,
    responses(
        (status = 200, description = "Booking completed", body = BookingResponse),
        (status = 409, description = "No active code", body = Error),
        (status = 422, description = "Wrong or expired code", body = Error),
        (status = 423, description = "Verification locked", body = Error)
    ),
    params(("id" = Uuid, Path, description = "Booking id")),
    tags = ["bookings"],
    operation_id = "verifyCompletion"
)]
#[post("/bookings/{id}/verify-otp")]
pub async fn verify_completion(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: web::Json<VerifyOtpBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Customer)?;
    let booking = state
        .bookings
        .verify_completion(path.into_inner(), identity.user_id, &payload.code)
        .await?;
    Ok(booking_json(booking))
}

/// Customer asks for the completion code again.
#[post("/bookings/{id}/otp/resend")]
pub async fn resend_otp(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Customer)?;
    state
        .bookings
        .resend_otp(path.into_inner(), identity.user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Request payload for a cancellation. The reason is required for admins.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub reason: Option<String>,
}

/// Cancel a booking. What happens depends on who asks: a customer cancels
/// (or requests cancellation once accepted), the assigned servicer confirms
/// a pending request, and an admin force-cancels with a reason.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    request_body = CancelBody,
    responses(
        (status = 200, description = "Updated booking", body = BookingResponse),
        (status = 409, description = "Too late to cancel", body = Error)
    ),
    params(("id" = Uuid, Path, description = "Booking id")),
    tags = ["bookings"],
    operation_id = "cancelBooking"
)]
#[post("/bookings/{id}/cancel")]
pub async fn cancel_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: Option<web::Json<CancelBody>>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let booking_id = path.into_inner();
    let booking = match identity.role {
        Role::Customer => {
            state
                .bookings
                .request_cancel(booking_id, identity.user_id)
                .await?
        }
        Role::Servicer => {
            state
                .bookings
                .confirm_cancel(booking_id, identity.user_id)
                .await?
        }
        Role::Admin => {
            let reason = payload
                .and_then(|body| body.into_inner().reason)
                .ok_or_else(|| Error::validation("a reason is required"))?;
            state.bookings.admin_cancel(booking_id, reason).await?
        }
    };
    Ok(booking_json(booking))
}

/// Servicer attests that the cash amount changed hands.
#[post("/bookings/{id}/cash-collected")]
pub async fn cash_collected(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Servicer)?;
    let booking = state
        .bookings
        .cash_collected(path.into_inner(), identity.user_id)
        .await?;
    Ok(booking_json(booking))
}

/// Customer rates a completed booking. One rating, ever.
#[post("/bookings/{id}/rate")]
pub async fn rate_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: web::Json<RatingBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Customer)?;
    let payload = payload.into_inner();
    let booking = state
        .bookings
        .rate(
            path.into_inner(),
            identity.user_id,
            payload.stars,
            payload.text,
        )
        .await?;
    Ok(booking_json(booking))
}

/// Refund response payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    /// One of `completed`, `pending`, or `already_refunded`.
    pub outcome: String,
}

/// Admin triggers a refund of a completed payment.
#[post("/bookings/{id}/refund")]
pub async fn refund_booking(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    session.require_role(Role::Admin)?;
    let outcome = state.bookings.refund(path.into_inner()).await?;
    let outcome = match outcome {
        RefundOutcome::Completed => "completed",
        RefundOutcome::Pending => "pending",
        RefundOutcome::AlreadyRefunded => "already_refunded",
    };
    Ok(HttpResponse::Ok().json(RefundResponse {
        outcome: outcome.to_owned(),
    }))
}
