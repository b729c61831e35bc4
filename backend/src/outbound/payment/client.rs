//! HTTP client for the card processor.
//!
//! The processor exposes three endpoints (`/authorizations`, `/captures`,
//! `/refunds`), all keyed by an `Idempotency-Key` header so a retried call
//! returns the original result instead of charging twice. Responses are
//! JSON with a `ref` on success; declines come back as 402 with a reason.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::ports::{ChargeRequest, PaymentGateway, PaymentGatewayError, RefundStatus};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Connection settings for the processor.
#[derive(Debug, Clone)]
pub struct CardGatewayConfig {
    /// Base URL, e.g. `https://gateway.example.com/v1`.
    pub base_url: String,
    /// Bearer token for the merchant account.
    pub api_key: String,
    /// Per-call timeout.
    pub timeout: std::time::Duration,
}

/// [`PaymentGateway`] implementation over the processor's REST API.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: CardGatewayConfig,
}

#[derive(Debug, Serialize)]
struct AuthorizeBody<'a> {
    booking_id: Uuid,
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Serialize)]
struct CaptureBody<'a> {
    authorization_ref: &'a str,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    capture_ref: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeclineResponse {
    #[serde(default)]
    reason: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(config: CardGatewayConfig) -> Result<Self, PaymentGatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| PaymentGatewayError::protocol(error.to_string()))?;
        Ok(Self { client, config })
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        idempotency_key: &str,
        body: &B,
    ) -> Result<RefResponse, PaymentGatewayError> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() || error.is_connect() {
                    PaymentGatewayError::unavailable(error.to_string())
                } else {
                    PaymentGatewayError::protocol(error.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => response
                .json::<RefResponse>()
                .await
                .map_err(|error| PaymentGatewayError::protocol(error.to_string())),
            StatusCode::PAYMENT_REQUIRED => {
                let reason = response
                    .json::<DeclineResponse>()
                    .await
                    .ok()
                    .and_then(|decline| decline.reason)
                    .unwrap_or_else(|| "card declined".to_owned());
                Err(PaymentGatewayError::declined(reason))
            }
            status if status.is_server_error() => {
                warn!(%status, path, "card processor unavailable");
                Err(PaymentGatewayError::unavailable(format!(
                    "processor answered {status}"
                )))
            }
            status => Err(PaymentGatewayError::protocol(format!(
                "unexpected processor status {status}"
            ))),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize(&self, request: &ChargeRequest) -> Result<String, PaymentGatewayError> {
        let body = AuthorizeBody {
            booking_id: request.booking_id,
            amount: request.amount.minor(),
            currency: request.currency.as_str(),
        };
        self.post("authorizations", &request.idempotency_key, &body)
            .await
            .map(|response| response.reference)
    }

    async fn capture(
        &self,
        authorization_ref: &str,
        idempotency_key: &str,
    ) -> Result<String, PaymentGatewayError> {
        let body = CaptureBody { authorization_ref };
        self.post("captures", idempotency_key, &body)
            .await
            .map(|response| response.reference)
    }

    async fn refund(
        &self,
        capture_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<RefundStatus, PaymentGatewayError> {
        let body = RefundBody {
            capture_ref,
            amount: amount.minor(),
        };
        let response = self.post("refunds", idempotency_key, &body).await?;
        match response.status.as_deref() {
            Some("pending") => Ok(RefundStatus::Pending {
                refund_ref: response.reference,
            }),
            _ => Ok(RefundStatus::Completed {
                refund_ref: response.reference,
            }),
        }
    }
}
