//! Live location tracking and ETA derivation.
//!
//! Servicers stream raw position samples while a booking is active. This
//! module keeps the per-booking route progress and decides which events are
//! worth broadcasting, so the sockets only see meaningful movement instead
//! of every GPS jitter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::booking::GeoPoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in metres.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();
    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// One raw position report from a servicer's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSample {
    pub booking_id: Uuid,
    pub servicer_id: Uuid,
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

impl TrackingSample {
    /// Reject samples with out-of-range coordinates.
    pub fn validate(&self) -> Result<(), Error> {
        if !(-90.0..=90.0).contains(&self.point.lat)
            || !(-180.0..=180.0).contains(&self.point.lon)
        {
            return Err(Error::validation("coordinates are out of range"));
        }
        Ok(())
    }
}

/// Thresholds for event derivation.
#[derive(Debug, Clone, Copy)]
pub struct TrackingPolicy {
    /// Movement below this is treated as GPS jitter and not broadcast.
    pub route_update_min_meters: f64,
    /// ETA changes smaller than this are not broadcast.
    pub eta_update_min_seconds: i64,
    /// Within this distance of the service location the servicer has arrived.
    pub arrival_radius_meters: f64,
    /// Assumed travel speed for the ETA estimate.
    pub avg_speed_kmh: f64,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self {
            route_update_min_meters: 100.0,
            eta_update_min_seconds: 30,
            arrival_radius_meters: 50.0,
            avg_speed_kmh: 25.0,
        }
    }
}

impl TrackingPolicy {
    /// Straight-line ETA in whole seconds at the assumed speed.
    pub fn eta_seconds(&self, distance_m: f64) -> i64 {
        if self.avg_speed_kmh <= 0.0 {
            return 0;
        }
        let speed_ms = self.avg_speed_kmh * 1_000.0 / 3_600.0;
        #[allow(clippy::cast_possible_truncation)]
        let eta = (distance_m / speed_ms).round() as i64;
        eta.max(0)
    }
}

/// Events derived from the sample stream, broadcast to booking participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackingEvent {
    TrackingStarted {
        point: GeoPoint,
        eta_seconds: i64,
    },
    RouteUpdate {
        point: GeoPoint,
    },
    EtaUpdate {
        eta_seconds: i64,
    },
    ServicerArrived {
        at: DateTime<Utc>,
    },
}

/// Per-booking derivation state, kept by the tracking service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProgress {
    pub last_point: Option<GeoPoint>,
    pub last_eta_seconds: Option<i64>,
    pub arrived_at: Option<DateTime<Utc>>,
}

impl RouteProgress {
    /// Fold one sample into the progress, returning the events to broadcast.
    ///
    /// Arrival fires exactly once; later samples still yield route updates
    /// but no further arrival or ETA events.
    pub fn observe(
        &mut self,
        sample: &TrackingSample,
        destination: GeoPoint,
        policy: &TrackingPolicy,
    ) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        let remaining = haversine_meters(sample.point, destination);
        let eta = policy.eta_seconds(remaining);

        match self.last_point {
            None => {
                events.push(TrackingEvent::TrackingStarted {
                    point: sample.point,
                    eta_seconds: eta,
                });
                self.last_point = Some(sample.point);
                self.last_eta_seconds = Some(eta);
            }
            Some(previous) => {
                if haversine_meters(previous, sample.point) >= policy.route_update_min_meters {
                    events.push(TrackingEvent::RouteUpdate {
                        point: sample.point,
                    });
                    self.last_point = Some(sample.point);
                }
                if self.arrived_at.is_none() {
                    let delta = self
                        .last_eta_seconds
                        .map_or(i64::MAX, |last| (last - eta).abs());
                    if delta >= policy.eta_update_min_seconds {
                        events.push(TrackingEvent::EtaUpdate { eta_seconds: eta });
                        self.last_eta_seconds = Some(eta);
                    }
                }
            }
        }

        if self.arrived_at.is_none() && remaining <= policy.arrival_radius_meters {
            self.arrived_at = Some(sample.recorded_at);
            events.push(TrackingEvent::ServicerArrived {
                at: sample.recorded_at,
            });
        }
        events
    }

    /// Whether the servicer has been within the arrival radius.
    pub fn has_arrived(&self) -> bool {
        self.arrived_at.is_some()
    }
}

#[cfg(test)]
#[path = "tracking_tests.rs"]
mod tests;
