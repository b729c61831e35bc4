//! HTTP inbound adapter exposing REST endpoints.

use actix_web::{HttpRequest, error::JsonPayloadError, web};

use crate::domain::Error;

pub mod auth;
pub mod bookings;
pub mod chat;
pub mod doc;
pub mod error;
pub mod health;
pub mod notifications;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod tracking;
pub mod wallet;
pub mod webhooks;

pub use error::ApiResult;

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    Error::validation(format!("invalid request body: {err}")).into()
}

/// Register every `/api/v1` endpoint.
///
/// `/bookings/open` is registered ahead of `/bookings/{id}` so the literal
/// segment wins the route match.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(auth::login)
            .service(auth::logout)
            .service(bookings::create_booking)
            .service(bookings::list_bookings)
            .service(bookings::open_bookings)
            .service(bookings::get_booking)
            .service(bookings::accept_booking)
            .service(bookings::schedule_booking)
            .service(bookings::start_booking)
            .service(bookings::verify_completion)
            .service(bookings::resend_otp)
            .service(bookings::cancel_booking)
            .service(bookings::cash_collected)
            .service(bookings::rate_booking)
            .service(bookings::refund_booking)
            .service(tracking::report_position)
            .service(tracking::tracking_snapshot)
            .service(chat::send_message)
            .service(chat::message_history)
            .service(chat::mark_read)
            .service(chat::delete_message)
            .service(wallet::balance)
            .service(wallet::statement)
            .service(wallet::request_payout)
            .service(wallet::topup)
            .service(notifications::list_notifications)
            .service(notifications::mark_notification_read)
            .service(webhooks::payment_webhook),
    );
}
