//! Port for service-category tariff lookups.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::booking::GeoPoint;
use crate::domain::money::Money;
use crate::domain::pricing::CategoryRate;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by category repository adapters.
    pub enum CategoryRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "category repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "category repository query failed: {message}",
    }
}

/// Port for reading category tariffs at quote time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// The category's current tariff, if the category exists.
    async fn rate_of(
        &self,
        category_id: Uuid,
    ) -> Result<Option<CategoryRate>, CategoryRepositoryError>;

    /// Where the category's servicer pool dispatches from, if configured.
    ///
    /// Travel distance is measured from here; without an origin the quote
    /// carries no travel component.
    async fn dispatch_origin(
        &self,
        category_id: Uuid,
    ) -> Result<Option<GeoPoint>, CategoryRepositoryError>;
}

/// Fixture tariff source with a flat rate for every category.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCategoryRepository;

#[async_trait]
impl CategoryRepository for FixtureCategoryRepository {
    async fn rate_of(
        &self,
        _category_id: Uuid,
    ) -> Result<Option<CategoryRate>, CategoryRepositoryError> {
        Ok(Some(CategoryRate {
            base_rate: Money::from_minor(100_000),
            per_km_rate: Money::ZERO,
            floor: Money::from_minor(20_000),
        }))
    }

    async fn dispatch_origin(
        &self,
        _category_id: Uuid,
    ) -> Result<Option<GeoPoint>, CategoryRepositoryError> {
        Ok(None)
    }
}
