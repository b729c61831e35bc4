//! Assembly of domain services and adapter state from configuration.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::warn;

use crate::domain::ports::{
    FixturePaymentGateway, Mailer, NoopMailer, NotificationSink, PaymentGateway,
};
use crate::domain::{
    BookingService, BookingServiceDeps, ChatService, TrackingService, WalletService,
    WebhookService,
};
use crate::inbound::http::state::HttpState;
use crate::inbound::ws::WsRegistry;
use crate::outbound::email::LettreMailer;
use crate::outbound::notify::NotificationFanout;
use crate::outbound::payment::HttpPaymentGateway;
use crate::outbound::persistence::MemoryStore;
use crate::server::config::AppConfig;

/// Build the full HTTP state and the WebSocket registry over one store.
///
/// Falls back to the approve-all payment fixture and the no-op mailer when
/// the corresponding configuration is absent, with a warning so operators
/// notice in production logs.
pub fn build_states(config: &AppConfig, store: &MemoryStore) -> (HttpState, WsRegistry) {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let registry = WsRegistry::new();

    let gateway: Arc<dyn PaymentGateway> = match &config.card_gateway {
        Some(card) => match HttpPaymentGateway::new(card.clone()) {
            Ok(gateway) => Arc::new(gateway),
            Err(error) => {
                warn!(%error, "card gateway construction failed; using fixture");
                Arc::new(FixturePaymentGateway)
            }
        },
        None => {
            warn!("no card gateway configured; card payments auto-approve");
            Arc::new(FixturePaymentGateway)
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => match LettreMailer::new(smtp.clone()) {
            Ok(mailer) => Arc::new(mailer),
            Err(error) => {
                warn!(%error, "mailer construction failed; email disabled");
                Arc::new(NoopMailer)
            }
        },
        None => Arc::new(NoopMailer),
    };

    let notifier: Arc<dyn NotificationSink> = Arc::new(NotificationFanout::new(
        Arc::new(store.clone()),
        Arc::new(registry.clone()),
        mailer,
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
            gateway,
            notifier: notifier.clone(),
            clock: clock.clone(),
        },
        config.booking_policy.clone(),
    );

    let http_state = HttpState {
        wallet: WalletService::new(
            Arc::new(store.clone()),
            notifier.clone(),
            clock.clone(),
            config.wallet_policy.clone(),
        ),
        chat: ChatService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            notifier,
            Arc::new(registry.clone()),
            clock.clone(),
        ),
        tracking: TrackingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(registry.clone()),
            config.booking_policy.tracking,
        ),
        webhooks: WebhookService::new(Arc::new(store.clone()), bookings.clone(), clock),
        bookings,
        notifications: Arc::new(store.clone()),
        webhook_secret: Arc::from(config.webhook_secret.as_str()),
    };

    (http_state, registry)
}
