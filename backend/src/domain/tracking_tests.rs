//! Event-derivation coverage for route progress.

use chrono::{TimeDelta, TimeZone, Utc};
use rstest::rstest;
use uuid::Uuid;

use super::*;

// Roughly 0.001 degrees of latitude is 111 metres.
const DEG_PER_100M_LAT: f64 = 0.0009;

fn destination() -> GeoPoint {
    GeoPoint {
        lat: 12.9716,
        lon: 77.5946,
    }
}

fn sample_at(lat_offset: f64, minute: u32) -> TrackingSample {
    let dest = destination();
    TrackingSample {
        booking_id: Uuid::new_v4(),
        servicer_id: Uuid::new_v4(),
        point: GeoPoint {
            lat: dest.lat + lat_offset,
            lon: dest.lon,
        },
        recorded_at: Utc
            .with_ymd_and_hms(2026, 3, 1, 11, minute, 0)
            .single()
            .expect("valid ts"),
    }
}

#[rstest]
fn haversine_matches_known_distance() {
    let a = GeoPoint {
        lat: 12.9716,
        lon: 77.5946,
    };
    let b = GeoPoint {
        lat: 12.9816,
        lon: 77.5946,
    };
    let d = haversine_meters(a, b);
    // 0.01 degrees of latitude is about 1.11 km.
    assert!((d - 1_112.0).abs() < 10.0, "got {d}");
}

#[rstest]
fn first_sample_starts_tracking() {
    let mut progress = RouteProgress::default();
    let events = progress.observe(
        &sample_at(30.0 * DEG_PER_100M_LAT, 0),
        destination(),
        &TrackingPolicy::default(),
    );
    assert!(matches!(
        events.as_slice(),
        [TrackingEvent::TrackingStarted { .. }]
    ));
}

#[rstest]
fn jitter_below_threshold_is_suppressed() {
    let mut progress = RouteProgress::default();
    let policy = TrackingPolicy::default();
    progress.observe(&sample_at(30.0 * DEG_PER_100M_LAT, 0), destination(), &policy);
    // Moves about 20 m and the ETA shifts by a few seconds only.
    let events = progress.observe(
        &sample_at(29.8 * DEG_PER_100M_LAT, 1),
        destination(),
        &policy,
    );
    assert!(events.is_empty(), "got {events:?}");
}

#[rstest]
fn big_moves_yield_route_and_eta_updates() {
    let mut progress = RouteProgress::default();
    let policy = TrackingPolicy::default();
    progress.observe(&sample_at(50.0 * DEG_PER_100M_LAT, 0), destination(), &policy);
    // Closes about 3 km, cutting the ETA by several minutes.
    let events = progress.observe(
        &sample_at(20.0 * DEG_PER_100M_LAT, 5),
        destination(),
        &policy,
    );
    assert!(events
        .iter()
        .any(|event| matches!(event, TrackingEvent::RouteUpdate { .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, TrackingEvent::EtaUpdate { .. })));
}

#[rstest]
fn arrival_fires_once_within_radius() {
    let mut progress = RouteProgress::default();
    let policy = TrackingPolicy::default();
    progress.observe(&sample_at(10.0 * DEG_PER_100M_LAT, 0), destination(), &policy);
    let near = sample_at(0.0002, 8);
    let events = progress.observe(&near, destination(), &policy);
    assert!(events
        .iter()
        .any(|event| matches!(event, TrackingEvent::ServicerArrived { .. })));
    assert!(progress.has_arrived());
    // A later sample inside the radius does not re-fire arrival.
    let events = progress.observe(&sample_at(0.0001, 9), destination(), &policy);
    assert!(!events
        .iter()
        .any(|event| matches!(event, TrackingEvent::ServicerArrived { .. })));
}

#[rstest]
#[case(0.0, 0)]
#[case(25_000.0, 3_600)]
#[case(1_000.0, 144)]
fn eta_uses_the_configured_speed(#[case] distance_m: f64, #[case] expected: i64) {
    let policy = TrackingPolicy::default();
    assert_eq!(policy.eta_seconds(distance_m), expected);
}

#[rstest]
fn out_of_range_coordinates_are_rejected() {
    let mut sample = sample_at(0.0, 0);
    sample.point.lat = 91.0;
    assert!(sample.validate().is_err());
    sample.point.lat = 45.0;
    sample.point.lon = -181.0;
    assert!(sample.validate().is_err());
}

#[rstest]
fn recorded_at_ordering_is_preserved_by_samples() {
    let first = sample_at(0.01, 0);
    let second = sample_at(0.009, 1);
    assert!(second.recorded_at - first.recorded_at >= TimeDelta::minutes(1));
}
