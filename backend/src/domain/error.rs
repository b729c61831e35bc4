//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses, WebSocket frames, or any other protocol-specific envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::middleware::trace::TraceId;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or violates a validation rule.
    Validation,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested resource does not exist.
    NotFound,
    /// The requested booking state transition is not in the legal set.
    IllegalTransition,
    /// A competing servicer accepted the booking first.
    AlreadyAssigned,
    /// The servicer already started the service; cancellation is closed.
    TooLateToCancel,
    /// No unverified, unexpired OTP exists for the booking.
    NoActiveOtp,
    /// The submitted OTP code does not match.
    OtpMismatch,
    /// The OTP passed its expiry instant.
    OtpExpired,
    /// Too many failed attempts; verification is locked out.
    OtpLocked,
    /// The card processor declined the authorization.
    PaymentDeclined,
    /// Capturing a previously authorized payment failed.
    CaptureFailed,
    /// The refund was accepted but confirmation is asynchronous.
    RefundPending,
    /// A ledger posting does not sum to zero per currency.
    NotBalanced,
    /// The posting would drive a wallet balance below zero.
    InsufficientBalance,
    /// The wallet balance is below the payout threshold.
    MinPayoutNotMet,
    /// A cooldown or rate limit rejected the request.
    RateLimited,
    /// The request deadline expired before the operation finished.
    Timeout,
    /// An unexpected error occurred inside the domain.
    Internal,
}

impl ErrorCode {
    /// Whether a caller may retry the same request unchanged.
    ///
    /// Domain rule failures are final; only infrastructure-shaped failures
    /// are worth retrying.
    pub fn retriable(self) -> bool {
        matches!(self, Self::Timeout | Self::Internal)
    }
}

/// Domain error payload surfaced uniformly as `{code, message, retriable}`.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use backend::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("missing booking");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert!(!err.retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[schema(example = "illegal_transition")]
    code: ErrorCode,
    #[schema(example = "booking is not pending")]
    message: String,
    retriable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    /// Correlation identifier copied from the active request scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl Error {
    /// Create a new error for the given code.
    ///
    /// Captures the scoped [`TraceId`] automatically when one is active.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(
            !message.trim().is_empty(),
            "error messages must not be empty"
        );
        Self {
            code,
            message,
            retriable: code.retriable(),
            details: None,
            trace_id: TraceId::current().map(|id| id.to_string()),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn retriable(&self) -> bool {
        self.retriable
    }

    /// Supplementary structured details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Override the captured trace identifier.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Convenience constructor for [`ErrorCode::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::IllegalTransition`].
    pub fn illegal_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IllegalTransition, message)
    }

    /// Convenience constructor for [`ErrorCode::RateLimited`].
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    /// Convenience constructor for [`ErrorCode::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Convenience constructor for [`ErrorCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}
