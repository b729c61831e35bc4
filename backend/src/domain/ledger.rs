//! Double-entry ledger primitives.
//!
//! Every money movement is a balanced set of entries: within one posting the
//! amounts sum to zero per currency. Entries are append-only; corrections are
//! reversing entries that point back at the original via `reversal_of`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::{Booking, PricingSnapshot};
use crate::domain::money::{Currency, Money};
use crate::domain::{Error, ErrorCode};

/// Well-known account for the platform's fee revenue.
pub const PLATFORM_ACCOUNT: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
/// Well-known account representing the external bank rail.
///
/// Payouts debit a servicer wallet and credit this account; wallet top-ups do
/// the reverse. It is the only account allowed to go negative.
pub const BANK_ACCOUNT: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0002);

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Customer debit for a captured booking payment.
    BookingPayment,
    /// Platform's share of a captured payment.
    PlatformFee,
    /// Servicer's share of a captured payment.
    ServicerEarning,
    /// Reversal of a previously posted entry.
    Refund,
    /// Debit side of a payout leaving a servicer wallet.
    PayoutDebit,
    /// Credit side of a payout arriving at the bank rail.
    PayoutCredit,
    /// Customer funding their wallet from the bank rail.
    WalletTopup,
}

/// One immutable line of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    pub kind: EntryKind,
    /// Signed amount; debits are negative, credits positive.
    pub amount: Money,
    pub currency: Currency,
    /// Set on refund entries: the entry this one reverses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversal_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a reversing entry for `self` with the amount negated.
    pub fn reversal(&self, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: self.account_id,
            booking_id: self.booking_id,
            kind: EntryKind::Refund,
            amount: self.amount.negate(),
            currency: self.currency.clone(),
            reversal_of: Some(self.id),
            created_at: now,
        }
    }
}

/// Reject a posting whose entries do not sum to zero per currency.
///
/// # Errors
/// Returns `NotBalanced` naming the offending currency and residual.
pub fn validate_balanced(entries: &[LedgerEntry]) -> Result<(), Error> {
    if entries.is_empty() {
        return Err(Error::new(
            ErrorCode::NotBalanced,
            "a posting must contain at least one entry",
        ));
    }
    let mut sums: Vec<(&Currency, Money)> = Vec::new();
    for entry in entries {
        match sums.iter_mut().find(|(currency, _)| *currency == &entry.currency) {
            Some((_, sum)) => *sum = *sum + entry.amount,
            None => sums.push((&entry.currency, entry.amount)),
        }
    }
    for (currency, sum) in sums {
        if sum != Money::ZERO {
            return Err(Error::new(
                ErrorCode::NotBalanced,
                format!("posting leaves a residual of {sum} {currency}"),
            ));
        }
    }
    Ok(())
}

/// The balanced posting for a captured booking payment.
///
/// Customer pays the full quote; the platform takes its fee and the servicer
/// wallet is credited the remainder.
pub fn capture_posting(booking: &Booking, now: DateTime<Utc>) -> Result<Vec<LedgerEntry>, Error> {
    let Some(servicer_id) = booking.servicer_id else {
        return Err(Error::internal("cannot capture an unassigned booking"));
    };
    let PricingSnapshot {
        quoted_amount,
        platform_fee,
        servicer_earning,
        ref currency,
    } = booking.pricing;
    let entries = vec![
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: booking.customer_id,
            booking_id: Some(booking.id),
            kind: EntryKind::BookingPayment,
            amount: quoted_amount.negate(),
            currency: currency.clone(),
            reversal_of: None,
            created_at: now,
        },
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: PLATFORM_ACCOUNT,
            booking_id: Some(booking.id),
            kind: EntryKind::PlatformFee,
            amount: platform_fee,
            currency: currency.clone(),
            reversal_of: None,
            created_at: now,
        },
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: servicer_id,
            booking_id: Some(booking.id),
            kind: EntryKind::ServicerEarning,
            amount: servicer_earning,
            currency: currency.clone(),
            reversal_of: None,
            created_at: now,
        },
    ];
    validate_balanced(&entries)?;
    Ok(entries)
}

/// Reversing posting for a refunded booking: every original entry is negated.
pub fn refund_posting(
    originals: &[LedgerEntry],
    now: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>, Error> {
    let entries: Vec<LedgerEntry> = originals.iter().map(|entry| entry.reversal(now)).collect();
    validate_balanced(&entries)?;
    Ok(entries)
}

/// The two-sided posting for an approved payout.
pub fn payout_posting(
    servicer_id: Uuid,
    amount: Money,
    currency: Currency,
    now: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>, Error> {
    if amount <= Money::ZERO {
        return Err(Error::validation("payout amount must be positive"));
    }
    let entries = vec![
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: servicer_id,
            booking_id: None,
            kind: EntryKind::PayoutDebit,
            amount: amount.negate(),
            currency: currency.clone(),
            reversal_of: None,
            created_at: now,
        },
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: BANK_ACCOUNT,
            booking_id: None,
            kind: EntryKind::PayoutCredit,
            amount,
            currency,
            reversal_of: None,
            created_at: now,
        },
    ];
    validate_balanced(&entries)?;
    Ok(entries)
}

/// The two-sided posting for a wallet top-up from the bank rail.
pub fn topup_posting(
    account_id: Uuid,
    amount: Money,
    currency: Currency,
    now: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>, Error> {
    if amount <= Money::ZERO {
        return Err(Error::validation("top-up amount must be positive"));
    }
    let entries = vec![
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: BANK_ACCOUNT,
            booking_id: None,
            kind: EntryKind::WalletTopup,
            amount: amount.negate(),
            currency: currency.clone(),
            reversal_of: None,
            created_at: now,
        },
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id,
            booking_id: None,
            kind: EntryKind::WalletTopup,
            amount,
            currency,
            reversal_of: None,
            created_at: now,
        },
    ];
    validate_balanced(&entries)?;
    Ok(entries)
}

/// Sum the balance of one account from its entries.
pub fn balance_of(account_id: Uuid, entries: &[LedgerEntry]) -> Money {
    entries
        .iter()
        .filter(|entry| entry.account_id == account_id)
        .map(|entry| entry.amount)
        .sum()
}
