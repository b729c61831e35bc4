//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;
use mockable::DefaultClock;

use crate::domain::ports::{
    FixturePaymentGateway, NoopBroadcaster, NoopMailer, NotificationSink,
};
use crate::domain::tracking::TrackingPolicy;
use crate::domain::{
    BookingPolicy, BookingService, BookingServiceDeps, ChatService, TrackingService, WalletPolicy,
    WalletService, WebhookService,
};
use crate::inbound::http::state::HttpState;
use crate::outbound::notify::NotificationFanout;
use crate::outbound::persistence::MemoryStore;

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Wire a full [`HttpState`] over a single in-memory store.
pub fn test_http_state(store: &MemoryStore) -> HttpState {
    let clock = Arc::new(DefaultClock);
    let notifier: Arc<dyn NotificationSink> = Arc::new(NotificationFanout::new(
        Arc::new(store.clone()),
        Arc::new(NoopBroadcaster),
        Arc::new(NoopMailer),
        Arc::new(store.clone()),
    ));
    let bookings = BookingService::new(
        BookingServiceDeps {
            bookings: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            otps: Arc::new(store.clone()),
            tracking: Arc::new(store.clone()),
            categories: Arc::new(store.clone()),
            promos: Arc::new(store.clone()),
            directory: Arc::new(store.clone()),
            gateway: Arc::new(FixturePaymentGateway),
            notifier: notifier.clone(),
            clock: clock.clone(),
        },
        BookingPolicy::default(),
    );
    HttpState {
        wallet: WalletService::new(
            Arc::new(store.clone()),
            notifier.clone(),
            clock.clone(),
            WalletPolicy::default(),
        ),
        chat: ChatService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            notifier,
            Arc::new(NoopBroadcaster),
            clock.clone(),
        ),
        tracking: TrackingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(NoopBroadcaster),
            TrackingPolicy::default(),
        ),
        webhooks: WebhookService::new(Arc::new(store.clone()), bookings.clone(), clock),
        bookings,
        notifications: Arc::new(store.clone()),
        webhook_secret: Arc::from("test-webhook-secret"),
    }
}
