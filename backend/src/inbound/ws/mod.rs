//! WebSocket inbound adapter carrying domain events and client frames.
//!
//! Responsibilities:
//! - authenticate upgrade requests against the session cookie
//! - register the connection with the broadcast registry
//! - route client application frames to the domain services
//! - keep WebSocket-specific concerns at the edge of the system

use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use tracing::{error, info};

mod router;
mod session;

pub mod messages;
pub mod registry;

pub use registry::WsRegistry;

use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use messages::ServerFrame;
use router::FrameRouter;

/// Handle WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    registry: web::Data<WsRegistry>,
    state: web::Data<HttpState>,
    session_ctx: SessionContext,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let identity = session_ctx.require()?;

    let (response, mut ws_session, msg_stream) =
        actix_ws::handle(&req, stream).map_err(|err| {
            error!(error = %err, "WebSocket upgrade failed");
            err
        })?;

    let frames = registry.register(identity.user_id);
    let router = FrameRouter::new(identity.user_id, state.get_ref().clone());
    info!(user_id = %identity.user_id, "WebSocket connected");

    actix_web::rt::spawn(async move {
        let connected = ServerFrame::Connected {
            user_id: identity.user_id,
        };
        match serde_json::to_string(&connected) {
            Ok(ack) => {
                if ws_session.text(ack).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                error!(error = %err, "failed to encode connected frame");
                return;
            }
        }
        session::handle_ws_session(ws_session, msg_stream, frames, router).await;
    });

    Ok(response)
}
