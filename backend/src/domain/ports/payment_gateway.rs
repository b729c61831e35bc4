//! Port for card-processor adapters and their errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::money::{Currency, Money};

use super::define_port_error;

define_port_error! {
    /// Failures surfaced by payment gateway adapters.
    pub enum PaymentGatewayError {
        /// The processor rejected the charge.
        Declined { message: String } => "payment declined: {message}",
        /// The processor could not be reached or timed out.
        Unavailable { message: String } => "payment processor unavailable: {message}",
        /// The processor answered with something we could not interpret.
        Protocol { message: String } => "payment processor protocol error: {message}",
    }
}

impl PaymentGatewayError {
    /// Only availability problems are worth a retry with the same
    /// idempotency key; declines and protocol errors are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// One charge to authorize, keyed for safe retries.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub booking_id: Uuid,
    pub amount: Money,
    pub currency: Currency,
    /// Stable per-operation key; retries must reuse it.
    pub idempotency_key: String,
}

/// How the processor settled a refund request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundStatus {
    /// Funds returned synchronously.
    Completed { refund_ref: String },
    /// Accepted; confirmation arrives later on the webhook.
    Pending { refund_ref: String },
}

/// Port for the external card processor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Place a hold for the quoted amount; returns the authorization ref.
    async fn authorize(&self, request: &ChargeRequest) -> Result<String, PaymentGatewayError>;

    /// Capture a previously authorized hold; returns the capture ref.
    async fn capture(
        &self,
        authorization_ref: &str,
        idempotency_key: &str,
    ) -> Result<String, PaymentGatewayError>;

    /// Return captured funds, fully or partially.
    async fn refund(
        &self,
        capture_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<RefundStatus, PaymentGatewayError>;
}

/// Fixture processor that approves everything synchronously.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePaymentGateway;

#[async_trait]
impl PaymentGateway for FixturePaymentGateway {
    async fn authorize(&self, request: &ChargeRequest) -> Result<String, PaymentGatewayError> {
        Ok(format!("auth-{}", request.booking_id.simple()))
    }

    async fn capture(
        &self,
        authorization_ref: &str,
        _idempotency_key: &str,
    ) -> Result<String, PaymentGatewayError> {
        Ok(format!("cap-{authorization_ref}"))
    }

    async fn refund(
        &self,
        capture_ref: &str,
        _amount: Money,
        _idempotency_key: &str,
    ) -> Result<RefundStatus, PaymentGatewayError> {
        Ok(RefundStatus::Completed {
            refund_ref: format!("ref-{capture_ref}"),
        })
    }
}
