//! Domain layer: entities, value objects, services, and the ports they
//! drive. Everything here is transport agnostic; inbound adapters translate
//! HTTP and WebSocket traffic into these calls and outbound adapters
//! implement the ports.

pub mod booking;
pub mod booking_service;
mod booking_service_support;
pub mod chat;
pub mod chat_service;
mod error;
pub mod ledger;
pub mod money;
pub mod notifications;
pub mod otp;
pub mod ports;
pub mod pricing;
pub mod tracking;
pub mod tracking_service;
pub mod wallet_service;
pub mod webhooks;

pub use booking::{
    Actor, Booking, BookingDraft, BookingState, GeoPoint, PaymentMethod, PaymentStatus,
    PricingSnapshot, Rating, Role, ServiceLocation, StateChange,
};
pub use booking_service::{
    BookingPolicy, BookingService, BookingServiceDeps, CreateBookingRequest, RefundOutcome,
};
pub use chat_service::ChatService;
pub use error::{Error, ErrorCode};
pub use money::{Currency, Money};
pub use tracking_service::{TrackingService, TrackingSnapshot};
pub use wallet_service::{WalletPolicy, WalletService};
pub use webhooks::{WebhookDisposition, WebhookEvent, WebhookEventKind, WebhookService};
