//! WebSocket frame contract.
//!
//! Every frame is a JSON object with a `type` discriminator. The server
//! pushes three application frames, composed by the domain services:
//!
//! ```text
//! {"type": "notification", "notification": {…inbox record…}}
//! {"type": "tracking", "bookingId": "…", "event": {…tracking event…}}
//! {"type": "chat", "bookingId": "…", "message": {…chat message…}}
//! ```
//!
//! Clients send their own application frames on the same socket; see
//! [`ClientFrame`]. Chat bodies reuse the domain's tagged `kind` encoding,
//! so the socket wire shape and the HTTP wire shape stay identical.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::chat::MessageBody;

/// Frames the WebSocket adapter itself originates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// First frame after the upgrade, confirming the authenticated identity.
    #[serde(rename_all = "camelCase")]
    Connected { user_id: Uuid },
}

/// Application frames clients send over the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A position sample from the assigned servicer.
    #[serde(rename_all = "camelCase")]
    LocationUpdate { booking_id: Uuid, lat: f64, lon: f64 },
    /// A chat message; same payload shape as the HTTP send endpoint.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        booking_id: Uuid,
        #[serde(flatten)]
        body: MessageBody,
    },
    /// Transient typing indicator for the other participant.
    #[serde(rename_all = "camelCase")]
    Typing { booking_id: Uuid },
    /// Read cursor advance, same semantics as the HTTP endpoint.
    #[serde(rename_all = "camelCase")]
    MessageRead { booking_id: Uuid, seq: u64 },
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn connected_frame_wire_shape() {
        let user_id = Uuid::new_v4();
        let frame = serde_json::to_value(ServerFrame::Connected { user_id }).expect("encodes");
        assert_eq!(
            frame,
            json!({ "type": "connected", "userId": user_id.to_string() })
        );
        assert_eq!(frame.get("type").and_then(Value::as_str), Some("connected"));
    }

    #[test]
    fn client_frames_decode_from_their_wire_shapes() {
        let booking_id = Uuid::new_v4();
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "location_update",
            "bookingId": booking_id,
            "lat": 12.9716,
            "lon": 77.5946,
        }))
        .expect("decodes");
        assert!(matches!(frame, ClientFrame::LocationUpdate { .. }));

        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "send_message",
            "bookingId": booking_id,
            "kind": "text",
            "text": "on my way",
        }))
        .expect("decodes");
        assert_eq!(
            frame,
            ClientFrame::SendMessage {
                booking_id,
                body: MessageBody::Text {
                    text: "on my way".to_owned()
                },
            }
        );

        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "message_read",
            "bookingId": booking_id,
            "seq": 4,
        }))
        .expect("decodes");
        assert_eq!(frame, ClientFrame::MessageRead { booking_id, seq: 4 });
    }

    #[test]
    fn unknown_frame_types_are_rejected() {
        let result: Result<ClientFrame, _> = serde_json::from_value(json!({
            "type": "subscribe",
            "bookingId": Uuid::new_v4(),
        }));
        assert!(result.is_err());
    }
}
