//! Port for user contact and availability lookups.

use async_trait::async_trait;
use uuid::Uuid;

use super::define_port_error;

define_port_error! {
    /// Errors raised by user directory adapters.
    pub enum UserDirectoryError {
        /// Directory connection could not be established.
        Connection { message: String } => "user directory connection failed: {message}",
        /// Lookup failed during execution.
        Query { message: String } => "user directory query failed: {message}",
    }
}

/// Port for the identity system that owns user profiles.
///
/// The booking engine never stores profiles itself; it asks this port when
/// it needs an email address or the pool of servicers to notify.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user's email address, when one is on file.
    async fn email_of(&self, user_id: Uuid) -> Result<Option<String>, UserDirectoryError>;

    /// Servicers registered for a category, for new-booking fanout.
    async fn servicers_in_category(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<Uuid>, UserDirectoryError>;
}

/// Fixture directory with no users on file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserDirectory;

#[async_trait]
impl UserDirectory for FixtureUserDirectory {
    async fn email_of(&self, _user_id: Uuid) -> Result<Option<String>, UserDirectoryError> {
        Ok(None)
    }

    async fn servicers_in_category(
        &self,
        _category_id: Uuid,
    ) -> Result<Vec<Uuid>, UserDirectoryError> {
        Ok(Vec::new())
    }
}
