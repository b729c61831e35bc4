//! Session establishment handlers.
//!
//! ```text
//! POST   /api/v1/session  Establish a session for a verified identity
//! DELETE /api/v1/session  Drop the current session
//! ```
//!
//! Identity verification (phone OTP, OAuth, and friends) happens upstream at
//! the API gateway; this endpoint only converts a verified identity into the
//! session cookie the rest of the API authenticates with.

use std::str::FromStr;

use actix_web::{HttpResponse, delete, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{Error, Role};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::{Identity, SessionContext};

/// Request payload for establishing a session.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequestBody {
    #[schema(format = "uuid")]
    pub user_id: String,
    /// One of `customer`, `servicer`, or `admin`.
    pub role: String,
}

/// Establish a session.
#[utoipa::path(
    post,
    path = "/api/v1/session",
    request_body = LoginRequestBody,
    responses(
        (status = 204, description = "Session established"),
        (status = 400, description = "Invalid identity", body = Error)
    ),
    tags = ["session"],
    operation_id = "login"
)]
#[post("/session")]
pub async fn login(
    session: SessionContext,
    payload: web::Json<LoginRequestBody>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let user_id = uuid::Uuid::parse_str(&payload.user_id).map_err(|_| {
        Error::validation("userId must be a UUID")
            .with_details(json!({ "field": "userId", "value": payload.user_id }))
    })?;
    let role = Role::from_str(&payload.role)?;
    session.persist(Identity { user_id, role })?;
    Ok(HttpResponse::NoContent().finish())
}

/// Drop the current session.
#[utoipa::path(
    delete,
    path = "/api/v1/session",
    responses((status = 204, description = "Session dropped")),
    tags = ["session"],
    operation_id = "logout"
)]
#[delete("/session")]
pub async fn logout(session: SessionContext) -> HttpResponse {
    session.clear();
    HttpResponse::NoContent().finish()
}
