//! Card-processor adapter over its HTTP API.

mod client;

pub use client::{CardGatewayConfig, HttpPaymentGateway};
