//! Port for completion-OTP persistence adapters and their errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::otp::OtpRecord;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by OTP repository adapters.
    pub enum OtpRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "otp repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "otp repository query failed: {message}",
    }
}

/// Port for storing completion codes.
///
/// Adapters keep at most one record per booking: `upsert` replaces any
/// earlier record for the same booking, which is how issuing a new code
/// invalidates the previous one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Insert or replace the booking's completion code record.
    async fn upsert(&self, record: &OtpRecord) -> Result<(), OtpRepositoryError>;

    /// The booking's current record, verified or not.
    async fn find_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<OtpRecord>, OtpRepositoryError>;
}

/// Fixture implementation for tests that do not exercise OTP storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureOtpRepository;

#[async_trait]
impl OtpRepository for FixtureOtpRepository {
    async fn upsert(&self, _record: &OtpRecord) -> Result<(), OtpRepositoryError> {
        Ok(())
    }

    async fn find_for_booking(
        &self,
        _booking_id: Uuid,
    ) -> Result<Option<OtpRecord>, OtpRepositoryError> {
        Ok(None)
    }
}
