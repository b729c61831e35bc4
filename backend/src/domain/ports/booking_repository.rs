//! Port for booking persistence adapters and their errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::booking::Booking;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by booking repository adapters.
    pub enum BookingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "booking repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "booking repository query failed: {message}",
        /// A concurrent writer updated the booking first.
        VersionConflict { message: String, version: u64 } =>
            "booking version conflict at v{version}: {message}",
    }
}

impl BookingRepositoryError {
    /// Connection failures are worth retrying; conflicts and bad queries are
    /// final for the in-flight attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Port for reading and writing booking aggregates.
///
/// `update` is a compare-and-set: the adapter must reject the write with
/// [`BookingRepositoryError::VersionConflict`] when the stored version does
/// not equal `expected_version`. The caller passes the booking with its
/// version already bumped past `expected_version`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a brand-new booking.
    async fn insert(&self, booking: &Booking) -> Result<(), BookingRepositoryError>;

    /// Conditionally overwrite a booking at `expected_version`.
    async fn update(
        &self,
        booking: &Booking,
        expected_version: u64,
    ) -> Result<(), BookingRepositoryError>;

    /// Fetch a booking by identifier.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, BookingRepositoryError>;

    /// Bookings where the user is the customer or the assigned servicer.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingRepositoryError>;

    /// Unassigned pending bookings in a category, oldest first.
    async fn list_open_in_category(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<Booking>, BookingRepositoryError>;
}

/// Fixture implementation for tests that do not exercise booking persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureBookingRepository;

#[async_trait]
impl BookingRepository for FixtureBookingRepository {
    async fn insert(&self, _booking: &Booking) -> Result<(), BookingRepositoryError> {
        Ok(())
    }

    async fn update(
        &self,
        _booking: &Booking,
        _expected_version: u64,
    ) -> Result<(), BookingRepositoryError> {
        Ok(())
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Booking>, BookingRepositoryError> {
        Ok(None)
    }

    async fn list_for_user(&self, _user_id: Uuid) -> Result<Vec<Booking>, BookingRepositoryError> {
        Ok(Vec::new())
    }

    async fn list_open_in_category(
        &self,
        _category_id: Uuid,
    ) -> Result<Vec<Booking>, BookingRepositoryError> {
        Ok(Vec::new())
    }
}
