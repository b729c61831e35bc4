//! Port for persistent notification records and their errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::notifications::NotificationRecord;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by notification repository adapters.
    pub enum NotificationRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "notification repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "notification repository query failed: {message}",
    }
}

/// Port for the per-user notification inbox.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist one record per recipient.
    async fn append(
        &self,
        records: &[NotificationRecord],
    ) -> Result<(), NotificationRepositoryError>;

    /// A user's records, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, NotificationRepositoryError>;

    /// Mark one record read; returns false when it does not belong to the user.
    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, NotificationRepositoryError>;
}

/// Fixture implementation for tests that do not exercise the inbox.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureNotificationRepository;

#[async_trait]
impl NotificationRepository for FixtureNotificationRepository {
    async fn append(
        &self,
        _records: &[NotificationRecord],
    ) -> Result<(), NotificationRepositoryError> {
        Ok(())
    }

    async fn list_for_user(
        &self,
        _user_id: Uuid,
        _limit: usize,
    ) -> Result<Vec<NotificationRecord>, NotificationRepositoryError> {
        Ok(Vec::new())
    }

    async fn mark_read(
        &self,
        _id: Uuid,
        _user_id: Uuid,
        _now: DateTime<Utc>,
    ) -> Result<bool, NotificationRepositoryError> {
        Ok(false)
    }
}
