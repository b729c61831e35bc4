//! Internal helpers for the booking coordinator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Error, ErrorCode};
use crate::domain::ports::{
    BookingRepositoryError, CategoryRepositoryError, LedgerRepositoryError, OtpRepositoryError,
    TrackingRepositoryError, UserDirectoryError,
};

pub(crate) fn map_booking_repository_error(error: BookingRepositoryError) -> Error {
    Error::internal(format!("booking repository error: {error}"))
}

pub(crate) fn map_ledger_repository_error(error: LedgerRepositoryError) -> Error {
    match error {
        LedgerRepositoryError::Unbalanced { message } => {
            Error::new(ErrorCode::NotBalanced, message)
        }
        LedgerRepositoryError::InsufficientBalance { message } => {
            Error::new(ErrorCode::InsufficientBalance, message)
        }
        other => Error::internal(format!("ledger repository error: {other}")),
    }
}

pub(crate) fn map_otp_repository_error(error: OtpRepositoryError) -> Error {
    Error::internal(format!("otp repository error: {error}"))
}

pub(crate) fn map_category_repository_error(error: CategoryRepositoryError) -> Error {
    Error::internal(format!("category repository error: {error}"))
}

pub(crate) fn map_tracking_repository_error(error: TrackingRepositoryError) -> Error {
    Error::internal(format!("tracking repository error: {error}"))
}

pub(crate) fn map_directory_error(error: UserDirectoryError) -> Error {
    Error::internal(format!("user directory error: {error}"))
}

/// Serialises mutations per booking within this process.
///
/// The fast path: callers take the booking's async mutex before the
/// read-modify-write, so most contention never reaches the store's
/// compare-and-set. Entries are created on demand and never removed; the
/// map is bounded by the number of bookings a process touches.
#[derive(Debug, Default, Clone)]
pub(crate) struct BookingLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl BookingLocks {
    /// Acquire the per-booking mutex, creating it on first use.
    pub(crate) async fn acquire(&self, booking_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = match self.inner.lock() {
                Ok(map) => map,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(map.entry(booking_id).or_default())
        };
        slot.lock_owned().await
    }
}

/// Retry policy for transient infrastructure failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) attempts: u32,
    pub(crate) base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` up to `attempts` times, backing off exponentially
    /// while `is_transient` says the failure is worth another try.
    pub(crate) async fn run<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_transient: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.attempts && is_transient(&error) => {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Bound `future` by the operation deadline, mapping expiry to `Timeout`.
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    future: impl std::future::Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(
            "the operation did not finish before its deadline",
        )),
    }
}
