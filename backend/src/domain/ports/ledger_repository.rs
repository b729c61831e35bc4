//! Port for ledger persistence adapters and their errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::ledger::LedgerEntry;
use crate::domain::money::{Currency, Money};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by ledger repository adapters.
    pub enum LedgerRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "ledger repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "ledger repository query failed: {message}",
        /// The posting does not sum to zero per currency.
        Unbalanced { message: String } => "unbalanced posting rejected: {message}",
        /// A payout debit would drive a wallet below zero.
        InsufficientBalance { message: String } => "overdrawing posting rejected: {message}",
    }
}

/// Port for the append-only ledger.
///
/// `append` must persist the whole posting atomically: either every entry in
/// the slice becomes visible or none does. Adapters also reject, under the
/// same atomicity, any payout debit that would leave its wallet negative;
/// the balance check and the write must not interleave with other appends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Atomically persist a balanced posting.
    async fn append(&self, entries: &[LedgerEntry]) -> Result<(), LedgerRepositoryError>;

    /// Entries tied to a booking, oldest first.
    async fn entries_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError>;

    /// Entries for an account, oldest first.
    async fn entries_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError>;

    /// Current balance of an account in one currency.
    async fn balance(
        &self,
        account_id: Uuid,
        currency: &Currency,
    ) -> Result<Money, LedgerRepositoryError>;
}

/// Fixture implementation for tests that do not exercise the ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureLedgerRepository;

#[async_trait]
impl LedgerRepository for FixtureLedgerRepository {
    async fn append(&self, _entries: &[LedgerEntry]) -> Result<(), LedgerRepositoryError> {
        Ok(())
    }

    async fn entries_for_booking(
        &self,
        _booking_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError> {
        Ok(Vec::new())
    }

    async fn entries_for_account(
        &self,
        _account_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError> {
        Ok(Vec::new())
    }

    async fn balance(
        &self,
        _account_id: Uuid,
        _currency: &Currency,
    ) -> Result<Money, LedgerRepositoryError> {
        Ok(Money::ZERO)
    }
}
