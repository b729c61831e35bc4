//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI document for
//! the REST API: the annotated endpoint paths, the shared error schema, and
//! the session cookie security scheme. Swagger UI serves the document in
//! debug builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::booking::GeoPoint;
use crate::domain::chat::MessageBody;
use crate::domain::{Error, ErrorCode};
use crate::inbound::http::auth::LoginRequestBody;
use crate::inbound::http::bookings::{
    BookingResponse, CancelBody, CreateBookingBody, LocationBody, PricingBody, RatingBody,
    RefundResponse, ScheduleBody, StateChangeBody, VerifyOtpBody,
};
use crate::inbound::http::chat::MarkReadBody;
use crate::inbound::http::tracking::SampleBody;
use crate::inbound::http::wallet::{BalanceResponse, PayoutBody, PayoutResponse, TopupBody};
use crate::inbound::http::webhooks::WebhookAck;

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/v1/session.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Marketplace booking API",
        description = "Booking lifecycle, wallet, tracking, chat, and webhook \
                       endpoints for the service marketplace."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::auth::login,
        crate::inbound::http::auth::logout,
        crate::inbound::http::bookings::create_booking,
        crate::inbound::http::bookings::accept_booking,
        crate::inbound::http::bookings::verify_completion,
        crate::inbound::http::bookings::cancel_booking,
        crate::inbound::http::tracking::report_position,
        crate::inbound::http::chat::send_message,
        crate::inbound::http::wallet::balance,
        crate::inbound::http::wallet::request_payout,
        crate::inbound::http::webhooks::payment_webhook,
        crate::inbound::http::health::liveness,
        crate::inbound::http::health::readiness,
    ),
    components(schemas(
        Error,
        ErrorCode,
        LoginRequestBody,
        CreateBookingBody,
        BookingResponse,
        LocationBody,
        PricingBody,
        StateChangeBody,
        RatingBody,
        ScheduleBody,
        VerifyOtpBody,
        CancelBody,
        RefundResponse,
        SampleBody,
        GeoPoint,
        MessageBody,
        MarkReadBody,
        BalanceResponse,
        PayoutBody,
        PayoutResponse,
        TopupBody,
        WebhookAck,
    )),
    tags(
        (name = "session", description = "Session establishment"),
        (name = "bookings", description = "Booking lifecycle operations"),
        (name = "tracking", description = "Live servicer tracking"),
        (name = "chat", description = "In-booking messaging"),
        (name = "wallet", description = "Balances and payouts"),
        (name = "webhooks", description = "Payment processor callbacks"),
        (name = "health", description = "Probes for orchestration")
    )
)]
pub struct ApiDoc;
