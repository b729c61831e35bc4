//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and ports, and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::NotificationRepository;
use crate::domain::{
    BookingService, ChatService, TrackingService, WalletService, WebhookService,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub bookings: BookingService,
    pub wallet: WalletService,
    pub chat: ChatService,
    pub tracking: TrackingService,
    pub webhooks: WebhookService,
    pub notifications: Arc<dyn NotificationRepository>,
    /// Shared secret for verifying payment-processor webhook signatures.
    pub webhook_secret: Arc<str>,
}
