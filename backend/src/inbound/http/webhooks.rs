//! Payment-processor webhook endpoint.
//!
//! ```text
//! POST /api/v1/webhooks/payment  Signed processor event delivery
//! ```
//!
//! The signature is HMAC-SHA256 over the raw request body, hex encoded in
//! the `X-Signature` header. Verification happens here so the domain handler
//! only ever sees authenticated events.

use actix_web::{HttpRequest, HttpResponse, post, web};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::{Error, WebhookDisposition, WebhookEvent};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Header carrying the processor's hex-encoded HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str) -> Result<HmacSha256, Error> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::internal("webhook secret rejected by hmac"))
}

/// Compute the hex signature the processor is expected to send.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, Error> {
    let mut mac = mac_for(secret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify(secret: &str, body: &[u8], signature_hex: &str) -> Result<(), Error> {
    let signature = hex::decode(signature_hex)
        .map_err(|_| Error::unauthorized("malformed webhook signature"))?;
    let mut mac = mac_for(secret)?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| Error::unauthorized("webhook signature mismatch"))
}

/// Delivery acknowledgement payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    /// One of `applied`, `duplicate`, or `dead_lettered`.
    pub disposition: String,
}

/// Accept one signed processor event.
///
/// Events that verify but cannot be applied are parked and still
/// acknowledged, so the processor stops retrying them.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    request_body(
        content = String,
        content_type = "application/json",
        description = "Raw signed event payload"
    ),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Undecodable payload", body = Error),
        (status = 401, description = "Missing or invalid signature", body = Error)
    ),
    params(
        ("X-Signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body")
    ),
    tags = ["webhooks"],
    operation_id = "paymentWebhook"
)]
#[post("/webhooks/payment")]
pub async fn payment_webhook(
    state: web::Data<HttpState>,
    request: HttpRequest,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::unauthorized("missing webhook signature"))?;
    verify(&state.webhook_secret, &body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|error| {
        warn!(%error, "undecodable webhook payload");
        Error::validation("undecodable webhook payload")
    })?;
    let disposition = match state.webhooks.handle(event).await? {
        WebhookDisposition::Applied => "applied",
        WebhookDisposition::Duplicate => "duplicate",
        WebhookDisposition::DeadLettered => "dead_lettered",
    };
    Ok(HttpResponse::Ok().json(WebhookAck {
        disposition: disposition.to_owned(),
    }))
}
