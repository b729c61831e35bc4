//! Routes client application frames to the domain services.

use tracing::debug;
use uuid::Uuid;

use crate::domain::booking::GeoPoint;
use crate::domain::tracking::TrackingSample;
use crate::inbound::http::state::HttpState;

use super::messages::ClientFrame;

/// Dispatches decoded client frames for one authenticated connection.
///
/// Socket traffic is fire-and-forget: undecodable or rejected frames are
/// logged and dropped rather than closing the connection.
#[derive(Clone)]
pub struct FrameRouter {
    user_id: Uuid,
    state: HttpState,
}

impl FrameRouter {
    pub fn new(user_id: Uuid, state: HttpState) -> Self {
        Self { user_id, state }
    }

    /// Decode and apply one text frame from the client.
    pub async fn dispatch(&self, text: &str) {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(user_id = %self.user_id, %error, "undecodable client frame dropped");
                return;
            }
        };
        let outcome = match frame {
            ClientFrame::LocationUpdate {
                booking_id,
                lat,
                lon,
            } => self
                .state
                .tracking
                .report(TrackingSample {
                    booking_id,
                    servicer_id: self.user_id,
                    point: GeoPoint { lat, lon },
                    recorded_at: chrono::Utc::now(),
                })
                .await
                .map(|_| ()),
            ClientFrame::SendMessage { booking_id, body } => self
                .state
                .chat
                .send(booking_id, self.user_id, body)
                .await
                .map(|_| ()),
            ClientFrame::Typing { booking_id } => {
                self.state.chat.typing(booking_id, self.user_id).await
            }
            ClientFrame::MessageRead { booking_id, seq } => {
                self.state.chat.mark_read(booking_id, self.user_id, seq).await
            }
        };
        if let Err(error) = outcome {
            debug!(user_id = %self.user_id, %error, "client frame rejected");
        }
    }
}
