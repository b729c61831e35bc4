//! Per-connection WebSocket handler.
//!
//! Keeps WebSocket framing and heartbeats at the edge: the registry feeds
//! it the frames domain services publish, and client text frames are handed
//! to the router. The public WebSocket contract pings every 5s and
//! considers a connection idle after 10s without client traffic. Tests
//! shorten these intervals to speed up feedback; adjust the constants below
//! if SLAs change so clients and intermediaries stay aligned.

use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;
use tracing::{debug, warn};

use super::router::FrameRouter;

/// Time between heartbeats to the client (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before disconnecting the client (10s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

enum SessionEnd {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    Network(Closed),
}

pub(super) async fn handle_ws_session(
    mut session: Session,
    mut stream: MessageStream,
    mut frames: UnboundedReceiver<String>,
    router: FrameRouter,
) {
    let mut last_heartbeat = Instant::now();
    let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

    let end = loop {
        let result = tokio::select! {
            _ = heartbeat.tick() => {
                handle_heartbeat_tick(&mut session, &last_heartbeat).await
            }
            message = stream.recv() => {
                handle_stream_message(&mut session, &router, &mut last_heartbeat, message).await
            }
            frame = frames.recv() => {
                match frame {
                    Some(text) => session.text(text).await.map_err(SessionEnd::Network),
                    // The registry dropped us; drain the socket politely.
                    None => Err(SessionEnd::StreamClosed),
                }
            }
        };

        if let Err(end) = result {
            break end;
        }
    };

    log_shutdown_reason(&end);
    close_session_if_needed(session, end).await;
}

async fn handle_heartbeat_tick(
    session: &mut Session,
    last_heartbeat: &Instant,
) -> Result<(), SessionEnd> {
    if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
        return Err(SessionEnd::HeartbeatTimeout);
    }

    session.ping(b"").await.map_err(SessionEnd::Network)
}

async fn handle_stream_message(
    session: &mut Session,
    router: &FrameRouter,
    last_heartbeat: &mut Instant,
    message: Option<Result<Message, ProtocolError>>,
) -> Result<(), SessionEnd> {
    let Some(message) = message else {
        return Err(SessionEnd::StreamClosed);
    };

    match message {
        Ok(Message::Ping(payload)) => {
            *last_heartbeat = Instant::now();
            session.pong(&payload).await.map_err(SessionEnd::Network)
        }
        Ok(Message::Text(text)) => {
            *last_heartbeat = Instant::now();
            router.dispatch(&text).await;
            Ok(())
        }
        Ok(Message::Close(reason)) => Err(SessionEnd::ClientClosed(reason)),
        Ok(_) => {
            *last_heartbeat = Instant::now();
            Ok(())
        }
        Err(error) => Err(SessionEnd::Protocol(error)),
    }
}

fn log_shutdown_reason(end: &SessionEnd) {
    match end {
        SessionEnd::ClientClosed(reason) => {
            debug!(?reason, "client closed the WebSocket");
        }
        SessionEnd::StreamClosed => debug!("WebSocket stream ended"),
        SessionEnd::HeartbeatTimeout => warn!("WebSocket client missed heartbeats"),
        SessionEnd::Protocol(error) => warn!(%error, "WebSocket protocol error"),
        SessionEnd::Network(error) => debug!(%error, "WebSocket connection already gone"),
    }
}

async fn close_session_if_needed(session: Session, end: SessionEnd) {
    let reason = match end {
        SessionEnd::ClientClosed(reason) => reason,
        SessionEnd::HeartbeatTimeout => Some(CloseReason {
            code: CloseCode::Away,
            description: Some("heartbeat timeout".to_owned()),
        }),
        SessionEnd::StreamClosed => Some(CloseReason {
            code: CloseCode::Normal,
            description: None,
        }),
        SessionEnd::Protocol(_) => Some(CloseReason {
            code: CloseCode::Protocol,
            description: None,
        }),
        // Already closed at the transport; nothing to send.
        SessionEnd::Network(_) => return,
    };
    let _ = session.close(reason).await;
}
