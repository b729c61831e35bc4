//! Completion OTP records.
//!
//! The customer receives a short numeric code when service starts and
//! submits it back to confirm completion. Codes are never stored
//! in clear: only a salted SHA-256 digest is kept, so a leaked database
//! cannot be used to complete bookings.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{Error, ErrorCode};

/// Digits in a completion code.
pub const CODE_LENGTH: usize = 6;
/// Failed attempts before verification locks.
pub const MAX_ATTEMPTS: u8 = 5;
/// How long a lockout lasts.
pub const LOCKOUT: TimeDelta = TimeDelta::minutes(30);
/// Codes expire this long after issuance.
pub const VALIDITY: TimeDelta = TimeDelta::hours(24);
/// Minimum gap between issuing codes for the same booking.
pub const RESEND_COOLDOWN: TimeDelta = TimeDelta::seconds(60);

/// Tunable completion-code parameters; the constants above are the
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub length: usize,
    pub validity: TimeDelta,
    pub max_attempts: u8,
    pub lockout: TimeDelta,
    pub resend_cooldown: TimeDelta,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            length: CODE_LENGTH,
            validity: VALIDITY,
            max_attempts: MAX_ATTEMPTS,
            lockout: LOCKOUT,
            resend_cooldown: RESEND_COOLDOWN,
        }
    }
}

/// Generate a zero-padded numeric completion code of `length` digits.
pub fn generate_code<R: Rng>(rng: &mut R, length: usize) -> String {
    // Ten digits already exceed u32; cap well inside u64 range.
    let digits = length.clamp(4, 12);
    let exponent = u32::try_from(digits).unwrap_or(12);
    let n: u64 = rng.gen_range(0..10u64.pow(exponent));
    format!("{n:0digits$}")
}

/// A single issued completion code for a booking.
///
/// At most one unverified, unexpired record exists per booking; issuing a
/// new one supersedes the old, which the store marks expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    code_hash: String,
    salt: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u8,
    pub verified_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

fn hash_code(salt: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

impl OtpRecord {
    /// Issue a fresh record for `booking_id` hashing the given clear code.
    pub fn issue(booking_id: Uuid, code: &str, now: DateTime<Utc>, policy: &OtpPolicy) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            code_hash: hash_code(&salt, code),
            salt,
            issued_at: now,
            expires_at: now + policy.validity,
            attempts: 0,
            verified_at: None,
            locked_until: None,
        }
    }

    /// True while the record can still be verified.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.verified_at.is_none() && now < self.expires_at
    }

    /// Whether enough time has passed since issuance to allow a resend.
    pub fn cooldown_over(&self, now: DateTime<Utc>, policy: &OtpPolicy) -> bool {
        now - self.issued_at >= policy.resend_cooldown
    }

    /// Whether `code` hashes to this record, without touching attempt state.
    pub fn matches(&self, code: &str) -> bool {
        hash_code(&self.salt, code) == self.code_hash
    }

    /// Check `code` against this record, mutating attempt state.
    ///
    /// # Errors
    /// - `OtpLocked` while a lockout window is open (and on the attempt that
    ///   opens it).
    /// - `OtpExpired` past the validity window.
    /// - `NoActiveOtp` when the record was already verified.
    /// - `OtpMismatch` on a wrong code below the attempt limit.
    pub fn verify(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
        policy: &OtpPolicy,
    ) -> Result<(), Error> {
        if self.verified_at.is_some() {
            return Err(Error::new(
                ErrorCode::NoActiveOtp,
                "this code was already used",
            ));
        }
        if let Some(until) = self.locked_until {
            if now < until {
                return Err(Error::new(
                    ErrorCode::OtpLocked,
                    "verification is locked; try again later",
                ));
            }
            // Lockout elapsed: the attempt counter restarts.
            self.locked_until = None;
            self.attempts = 0;
        }
        if now >= self.expires_at {
            return Err(Error::new(ErrorCode::OtpExpired, "the code has expired"));
        }
        if !self.matches(code) {
            self.attempts = self.attempts.saturating_add(1);
            if self.attempts >= policy.max_attempts {
                self.locked_until = Some(now + policy.lockout);
                return Err(Error::new(
                    ErrorCode::OtpLocked,
                    "too many failed attempts; verification is locked",
                ));
            }
            return Err(Error::new(
                ErrorCode::OtpMismatch,
                "the code does not match",
            ));
        }
        self.verified_at = Some(now);
        Ok(())
    }
}
