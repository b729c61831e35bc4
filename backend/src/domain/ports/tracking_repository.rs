//! Port for route-progress persistence adapters and their errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::tracking::{RouteProgress, TrackingSample};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by tracking repository adapters.
    pub enum TrackingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "tracking repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "tracking repository query failed: {message}",
    }
}

/// Port for per-booking route progress and the raw sample trail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingRepository: Send + Sync {
    /// The booking's derivation state, if tracking has started.
    async fn load_progress(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<RouteProgress>, TrackingRepositoryError>;

    /// Overwrite the booking's derivation state.
    async fn save_progress(
        &self,
        booking_id: Uuid,
        progress: &RouteProgress,
    ) -> Result<(), TrackingRepositoryError>;

    /// Append a raw sample to the audit trail.
    async fn record_sample(&self, sample: &TrackingSample) -> Result<(), TrackingRepositoryError>;

    /// Most recent raw sample for a booking.
    async fn latest_sample(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<TrackingSample>, TrackingRepositoryError>;
}

/// Fixture implementation for tests that do not exercise tracking storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTrackingRepository;

#[async_trait]
impl TrackingRepository for FixtureTrackingRepository {
    async fn load_progress(
        &self,
        _booking_id: Uuid,
    ) -> Result<Option<RouteProgress>, TrackingRepositoryError> {
        Ok(None)
    }

    async fn save_progress(
        &self,
        _booking_id: Uuid,
        _progress: &RouteProgress,
    ) -> Result<(), TrackingRepositoryError> {
        Ok(())
    }

    async fn record_sample(&self, _sample: &TrackingSample) -> Result<(), TrackingRepositoryError> {
        Ok(())
    }

    async fn latest_sample(
        &self,
        _booking_id: Uuid,
    ) -> Result<Option<TrackingSample>, TrackingRepositoryError> {
        Ok(None)
    }
}
