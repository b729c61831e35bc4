//! Wallet balances and payouts on top of the ledger.
//!
//! There is no separate balance column anywhere: a wallet balance is always
//! the sum of the account's ledger entries, so it can never drift from the
//! entries that explain it.

use std::sync::Arc;

use mockable::Clock;
use tracing::warn;
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::ErrorCode;
use crate::domain::booking_service_support::map_ledger_repository_error;
use crate::domain::ledger::{LedgerEntry, payout_posting, topup_posting};
use crate::domain::money::{Currency, Money};
use crate::domain::notifications::{NotificationEvent, NotificationKind};
use crate::domain::ports::{LedgerRepository, NotificationSink};

/// Payout rules.
#[derive(Debug, Clone)]
pub struct WalletPolicy {
    /// Balances below this cannot be paid out at all.
    pub min_payout: Money,
    pub currency: Currency,
}

impl Default for WalletPolicy {
    fn default() -> Self {
        Self {
            min_payout: Money::from_minor(50_000),
            currency: Currency::new("inr"),
        }
    }
}

/// Reads balances and executes payouts and top-ups.
#[derive(Clone)]
pub struct WalletService {
    ledger: Arc<dyn LedgerRepository>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    policy: WalletPolicy,
}

impl WalletService {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        policy: WalletPolicy,
    ) -> Self {
        Self {
            ledger,
            notifier,
            clock,
            policy,
        }
    }

    /// Current balance in the platform currency.
    pub async fn balance(&self, account_id: Uuid) -> Result<Money, Error> {
        self.ledger
            .balance(account_id, &self.policy.currency)
            .await
            .map_err(map_ledger_repository_error)
    }

    /// The account's full entry history, oldest first.
    pub async fn statement(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, Error> {
        self.ledger
            .entries_for_account(account_id)
            .await
            .map_err(map_ledger_repository_error)
    }

    /// Pay out `amount` (or the whole balance when `None`) to the bank rail.
    ///
    /// # Errors
    /// - `MinPayoutNotMet` when the balance is below the payout floor.
    /// - `InsufficientBalance` when `amount` exceeds the balance.
    pub async fn request_payout(
        &self,
        servicer_id: Uuid,
        amount: Option<Money>,
    ) -> Result<Money, Error> {
        let balance = self.balance(servicer_id).await?;
        if balance < self.policy.min_payout {
            return Err(Error::new(
                ErrorCode::MinPayoutNotMet,
                format!("balance is below the {} payout floor", self.policy.min_payout),
            ));
        }
        let amount = amount.unwrap_or(balance);
        if amount > balance {
            return Err(Error::new(
                ErrorCode::InsufficientBalance,
                "payout exceeds the wallet balance",
            ));
        }
        let now = self.clock.utc();
        let entries = payout_posting(servicer_id, amount, self.policy.currency.clone(), now)?;
        self.ledger
            .append(&entries)
            .await
            .map_err(map_ledger_repository_error)?;
        let event = NotificationEvent::new(
            NotificationKind::PayoutApproved,
            vec![servicer_id],
            None,
            serde_json::json!({ "amount": amount }),
            now,
        );
        if let Err(error) = self.notifier.publish(&event).await {
            warn!(%servicer_id, %error, "payout notification failed");
        }
        Ok(amount)
    }

    /// Credit a wallet from the bank rail.
    pub async fn topup(&self, account_id: Uuid, amount: Money) -> Result<Money, Error> {
        let now = self.clock.utc();
        let entries = topup_posting(account_id, amount, self.policy.currency.clone(), now)?;
        self.ledger
            .append(&entries)
            .await
            .map_err(map_ledger_repository_error)?;
        self.balance(account_id).await
    }
}
