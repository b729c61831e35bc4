//! Booking aggregate and its state machine.
//!
//! The transition table below is the single authority on which state changes
//! are legal and for which actor. Preconditions that need I/O (servicer
//! availability, payment authorization, OTP issuance, the location gate) are
//! enforced by the coordinator before it applies a transition; this module
//! stays pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::{Currency, Money};
use crate::domain::{Error, ErrorCode};

/// Who is performing an action on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Servicer,
    Admin,
    /// Timeouts, OTP verification, webhook reconciliation.
    System,
}

/// Authenticated role carried by the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Servicer,
    Admin,
}

impl Role {
    /// The actor a role maps to when it mutates a booking.
    pub fn as_actor(self) -> Actor {
        match self {
            Self::Customer => Actor::Customer,
            Self::Servicer => Actor::Servicer,
            Self::Admin => Actor::Admin,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "servicer" => Ok(Self::Servicer),
            "admin" => Ok(Self::Admin),
            other => Err(Error::validation(format!("unknown role: {other}"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Customer => "customer",
            Self::Servicer => "servicer",
            Self::Admin => "admin",
        };
        write!(f, "{name}")
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
}

/// Progress of the money side of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing captured or authorized yet.
    Pending,
    /// Card pre-authorization exists; capture happens at completion.
    Authorized,
    /// Funds captured and ledger entries posted.
    Completed,
    /// Service completed on a cash booking; collection not yet attested.
    CashPending,
    /// Capture failed after completion; flagged for manual reconciliation.
    Failed,
    /// A refund was posted for the captured amount.
    Refunded,
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    Pending,
    Accepted,
    Scheduled,
    InProgress,
    CancelRequested,
    Completed,
    Cancelled,
}

impl BookingState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States in which tracking samples and chat messages are accepted.
    ///
    /// `scheduled` is included even though the distilled table names only
    /// `accepted` and `in_progress`: the scheduled → in_progress transition
    /// requires a location check, which needs samples to exist.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Accepted | Self::Scheduled | Self::InProgress)
    }

    /// Whether `actor` may move a booking from `self` to `to`.
    ///
    /// Re-entering the same state is never legal. Admin cancellation of any
    /// non-terminal state is the only wildcard row.
    pub fn can_transition(self, to: Self, actor: Actor) -> bool {
        if self == to {
            return false;
        }
        if to == Self::Cancelled && actor == Actor::Admin {
            return !self.is_terminal();
        }
        matches!(
            (self, to, actor),
            (Self::Pending, Self::Accepted, Actor::Servicer)
                | (Self::Pending, Self::Cancelled, Actor::Customer | Actor::System)
                | (
                    Self::Accepted,
                    Self::Scheduled,
                    Actor::Customer | Actor::Servicer
                )
                | (Self::Accepted | Self::Scheduled, Self::InProgress, Actor::Servicer)
                | (Self::InProgress, Self::Completed, Actor::System)
                | (
                    Self::Accepted | Self::Scheduled,
                    Self::CancelRequested,
                    Actor::Customer
                )
                | (
                    Self::CancelRequested,
                    Self::Cancelled,
                    Actor::Servicer | Actor::System
                )
        )
    }
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::CancelRequested => "cancel_requested",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One entry of a booking's ordered state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: BookingState,
    pub at: DateTime<Utc>,
    pub by: Actor,
    pub reason: Option<String>,
}

/// Geographic coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Where the service happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub point: GeoPoint,
    pub address: String,
}

/// Immutable pricing snapshot taken at creation time.
///
/// ## Invariants
/// - `platform_fee + servicer_earning == quoted_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub quoted_amount: Money,
    pub platform_fee: Money,
    pub servicer_earning: Money,
    pub currency: Currency,
}

/// Customer rating recorded after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub stars: u8,
    pub text: Option<String>,
}

impl Rating {
    /// Validate and build a rating; `stars` must be 1..=5.
    pub fn new(stars: u8, text: Option<String>) -> Result<Self, Error> {
        if !(1..=5).contains(&stars) {
            return Err(Error::validation("stars must be between 1 and 5"));
        }
        Ok(Self { stars, text })
    }
}

/// Input payload for [`Booking::create`].
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub category_id: Uuid,
    pub location: ServiceLocation,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub pricing: PricingSnapshot,
    pub method: PaymentMethod,
}

/// The booking aggregate.
///
/// Mutated only through the coordinator; every mutation bumps `version` so
/// the store can reject lost updates with a compare-and-set.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub servicer_id: Option<Uuid>,
    pub category_id: Uuid,
    pub location: ServiceLocation,
    pub requested_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub pricing: PricingSnapshot,
    pub method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_ref: Option<String>,
    pub state: BookingState,
    pub state_history: Vec<StateChange>,
    pub completion_otp_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cash_collected_at: Option<DateTime<Utc>>,
    pub rating: Option<Rating>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Booking {
    /// Build a fresh booking in `pending` with a seeded history entry.
    pub fn create(draft: BookingDraft, now: DateTime<Utc>) -> Self {
        let BookingDraft {
            id,
            customer_id,
            category_id,
            location,
            scheduled_at,
            pricing,
            method,
        } = draft;
        Self {
            id,
            customer_id,
            servicer_id: None,
            category_id,
            location,
            requested_at: now,
            scheduled_at,
            pricing,
            method,
            payment_status: PaymentStatus::Pending,
            payment_ref: None,
            state: BookingState::Pending,
            state_history: vec![StateChange {
                state: BookingState::Pending,
                at: now,
                by: Actor::Customer,
                reason: None,
            }],
            completion_otp_id: None,
            completed_at: None,
            cancelled_at: None,
            cash_collected_at: None,
            rating: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Apply a legal transition, appending to the state history.
    ///
    /// Returns `IllegalTransition` when the table forbids the move. The
    /// coordinator decides *which* error the caller sees for race losses
    /// (`AlreadyAssigned`, `TooLateToCancel`) before calling this.
    pub fn transition(
        &mut self,
        to: BookingState,
        by: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        if !self.state.can_transition(to, by) {
            return Err(Error::new(
                ErrorCode::IllegalTransition,
                format!("cannot move booking from {} to {to}", self.state),
            ));
        }
        self.state = to;
        self.state_history.push(StateChange {
            state: to,
            at: now,
            by,
            reason,
        });
        match to {
            BookingState::Completed => self.completed_at = Some(now),
            BookingState::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }

    /// When the booking reached a terminal state, if it has.
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.cancelled_at)
    }

    /// True when `user_id` is the customer or the assigned servicer.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.servicer_id == Some(user_id)
    }

    /// Customer plus the assigned servicer, for notification fanout.
    pub fn participants(&self) -> Vec<Uuid> {
        let mut recipients = vec![self.customer_id];
        recipients.extend(self.servicer_id);
        recipients
    }

    /// Validate that the recorded history is a path in the transition graph.
    ///
    /// Used by tests and the reconciler to detect corrupted documents.
    pub fn history_is_valid(&self) -> bool {
        let mut states = self.state_history.iter().map(|change| change.state);
        let Some(first) = states.next() else {
            return false;
        };
        if first != BookingState::Pending {
            return false;
        }
        let mut previous = first;
        for (change, state) in self.state_history.iter().skip(1).zip(states) {
            if !previous.can_transition(state, change.by) {
                return false;
            }
            previous = state;
        }
        previous == self.state
    }
}

#[cfg(test)]
#[path = "booking_tests.rs"]
mod tests;
