//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod booking_repository;
mod category_repository;
mod chat_repository;
mod ledger_repository;
mod mailer;
mod notification_repository;
mod notification_sink;
mod otp_repository;
mod payment_gateway;
mod promo_repository;
mod socket_broadcaster;
mod tracking_repository;
mod user_directory;
mod webhook_repository;

#[cfg(test)]
pub use booking_repository::MockBookingRepository;
pub use booking_repository::{BookingRepository, BookingRepositoryError, FixtureBookingRepository};
#[cfg(test)]
pub use category_repository::MockCategoryRepository;
pub use category_repository::{
    CategoryRepository, CategoryRepositoryError, FixtureCategoryRepository,
};
#[cfg(test)]
pub use chat_repository::MockChatRepository;
pub use chat_repository::{
    ChatRepository, ChatRepositoryError, FixtureChatRepository, NewChatMessage,
};
#[cfg(test)]
pub use ledger_repository::MockLedgerRepository;
pub use ledger_repository::{FixtureLedgerRepository, LedgerRepository, LedgerRepositoryError};
#[cfg(test)]
pub use mailer::MockMailer;
pub use mailer::{EmailMessage, Mailer, MailerError, NoopMailer};
#[cfg(test)]
pub use notification_repository::MockNotificationRepository;
pub use notification_repository::{
    FixtureNotificationRepository, NotificationRepository, NotificationRepositoryError,
};
#[cfg(test)]
pub use notification_sink::MockNotificationSink;
pub use notification_sink::{NoopNotificationSink, NotificationSink, NotificationSinkError};
#[cfg(test)]
pub use otp_repository::MockOtpRepository;
pub use otp_repository::{FixtureOtpRepository, OtpRepository, OtpRepositoryError};
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{
    ChargeRequest, FixturePaymentGateway, PaymentGateway, PaymentGatewayError, RefundStatus,
};
#[cfg(test)]
pub use promo_repository::MockPromoRepository;
pub use promo_repository::{FixturePromoRepository, PromoRepository, PromoRepositoryError};
#[cfg(test)]
pub use socket_broadcaster::MockSocketBroadcaster;
pub use socket_broadcaster::{BroadcastError, NoopBroadcaster, SocketBroadcaster};
#[cfg(test)]
pub use tracking_repository::MockTrackingRepository;
pub use tracking_repository::{
    FixtureTrackingRepository, TrackingRepository, TrackingRepositoryError,
};
#[cfg(test)]
pub use user_directory::MockUserDirectory;
pub use user_directory::{FixtureUserDirectory, UserDirectory, UserDirectoryError};
#[cfg(test)]
pub use webhook_repository::MockWebhookRepository;
pub use webhook_repository::{
    DeadLetter, FixtureWebhookRepository, WebhookRepository, WebhookRepositoryError,
};
