//! In-booking chat HTTP handlers.
//!
//! ```text
//! POST   /api/v1/bookings/{id}/messages        Send a message
//! GET    /api/v1/bookings/{id}/messages        Page through history
//! POST   /api/v1/bookings/{id}/messages/read   Move the read cursor
//! DELETE /api/v1/bookings/{id}/messages/{seq}  Tombstone an own message
//! ```
//!
//! Message bodies reuse the domain's tagged `kind` encoding, so the HTTP
//! wire shape and the WebSocket wire shape stay identical.

use actix_web::{HttpResponse, delete, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::chat::MessageBody;
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Send a message to the other participant.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/messages",
    responses(
        (status = 201, description = "Message stored"),
        (status = 400, description = "Invalid content or chat closed"),
        (status = 403, description = "Not a participant")
    ),
    params(("id" = Uuid, Path, description = "Booking id")),
    tags = ["chat"],
    operation_id = "sendMessage"
)]
#[post("/bookings/{id}/messages")]
pub async fn send_message(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: web::Json<MessageBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let stored = state
        .chat
        .send(path.into_inner(), identity.user_id, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(stored))
}

/// Query string for history pagination.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Return messages with a sequence number greater than this.
    #[serde(default)]
    pub after_seq: u64,
    pub limit: Option<usize>,
}

/// Page through the booking's history, oldest first.
#[get("/bookings/{id}/messages")]
pub async fn message_history(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let messages = state
        .chat
        .history(
            path.into_inner(),
            identity.user_id,
            query.after_seq,
            query.limit,
        )
        .await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// Request payload for the read cursor.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadBody {
    /// Everything up to and including this sequence number is read.
    pub seq: u64,
}

/// Move the caller's read cursor.
#[post("/bookings/{id}/messages/read")]
pub async fn mark_read(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: web::Json<MarkReadBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    state
        .chat
        .mark_read(path.into_inner(), identity.user_id, payload.seq)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Tombstone one of the caller's own messages; the sequence slot remains.
#[delete("/bookings/{id}/messages/{seq}")]
pub async fn delete_message(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<(Uuid, u64)>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let (booking_id, seq) = path.into_inner();
    state.chat.delete(booking_id, identity.user_id, seq).await?;
    Ok(HttpResponse::NoContent().finish())
}
