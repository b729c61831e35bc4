//! Tracking orchestration: sample intake, derivation, and broadcast.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::booking::Booking;
use crate::domain::booking_service_support::{
    map_booking_repository_error, map_tracking_repository_error,
};
use crate::domain::ports::{BookingRepository, SocketBroadcaster, TrackingRepository};
use crate::domain::tracking::{RouteProgress, TrackingEvent, TrackingPolicy, TrackingSample};

/// Point-in-time view for `GET /bookings/{id}/tracking`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub progress: RouteProgress,
    pub latest_sample: Option<TrackingSample>,
}

/// Accepts samples from servicers and pushes derived events to customers.
#[derive(Clone)]
pub struct TrackingService {
    tracking: Arc<dyn TrackingRepository>,
    bookings: Arc<dyn BookingRepository>,
    broadcaster: Arc<dyn SocketBroadcaster>,
    policy: TrackingPolicy,
}

impl TrackingService {
    pub fn new(
        tracking: Arc<dyn TrackingRepository>,
        bookings: Arc<dyn BookingRepository>,
        broadcaster: Arc<dyn SocketBroadcaster>,
        policy: TrackingPolicy,
    ) -> Self {
        Self {
            tracking,
            bookings,
            broadcaster,
            policy,
        }
    }

    /// Ingest one sample and broadcast whatever events it produces.
    ///
    /// Only the assigned servicer may report. Samples arriving outside the
    /// active states are dropped without error; mobile clients flush queued
    /// positions after the booking has moved on and must not see failures
    /// for it. Returns the events that were broadcast.
    pub async fn report(&self, sample: TrackingSample) -> Result<Vec<TrackingEvent>, Error> {
        sample.validate()?;
        let booking = self.load_booking(sample.booking_id).await?;
        if booking.servicer_id != Some(sample.servicer_id) {
            return Err(Error::forbidden("only the assigned servicer can report"));
        }
        if !booking.state.is_active() {
            debug!(booking_id = %sample.booking_id, state = %booking.state, "sample dropped");
            return Ok(Vec::new());
        }
        self.tracking
            .record_sample(&sample)
            .await
            .map_err(map_tracking_repository_error)?;
        let mut progress = self
            .tracking
            .load_progress(sample.booking_id)
            .await
            .map_err(map_tracking_repository_error)?
            .unwrap_or_default();
        let events = progress.observe(&sample, booking.location.point, &self.policy);
        self.tracking
            .save_progress(sample.booking_id, &progress)
            .await
            .map_err(map_tracking_repository_error)?;

        for event in &events {
            let frame = json!({
                "type": "tracking",
                "bookingId": sample.booking_id,
                "event": event,
            });
            if let Err(error) = self
                .broadcaster
                .send_to_user(booking.customer_id, &frame)
                .await
            {
                warn!(booking_id = %sample.booking_id, %error, "tracking broadcast failed");
            }
        }
        Ok(events)
    }

    /// Current progress and last known position; participants only.
    pub async fn snapshot(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
    ) -> Result<TrackingSnapshot, Error> {
        let booking = self.load_booking(booking_id).await?;
        if !booking.is_participant(user_id) {
            return Err(Error::forbidden("not a participant of this booking"));
        }
        let progress = self
            .tracking
            .load_progress(booking_id)
            .await
            .map_err(map_tracking_repository_error)?
            .unwrap_or_default();
        let latest_sample = self
            .tracking
            .latest_sample(booking_id)
            .await
            .map_err(map_tracking_repository_error)?;
        Ok(TrackingSnapshot {
            progress,
            latest_sample,
        })
    }

    async fn load_booking(&self, booking_id: Uuid) -> Result<Booking, Error> {
        self.bookings
            .find_by_id(booking_id)
            .await
            .map_err(map_booking_repository_error)?
            .ok_or_else(|| Error::not_found("no such booking"))
    }
}
