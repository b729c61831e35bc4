//! Port for promo code lookups at quote time.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by promo repository adapters.
    pub enum PromoRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "promo repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "promo repository query failed: {message}",
    }
}

/// Port for resolving promo codes to their discount.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromoRepository: Send + Sync {
    /// The code's discount in basis points, if the code is live.
    async fn discount_of(&self, code: &str) -> Result<Option<u32>, PromoRepositoryError>;
}

/// Fixture promo source that knows no codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePromoRepository;

#[async_trait]
impl PromoRepository for FixturePromoRepository {
    async fn discount_of(&self, _code: &str) -> Result<Option<u32>, PromoRepositoryError> {
        Ok(None)
    }
}
