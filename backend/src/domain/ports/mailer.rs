//! Port for outbound email adapters and their errors.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Failures surfaced by mailer adapters.
    pub enum MailerError {
        /// The relay rejected or could not accept the message.
        Transport { message: String } => "mail transport failed: {message}",
        /// The message itself could not be built.
        Compose { message: String } => "mail composition failed: {message}",
    }
}

/// A plain-text email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Port for the outbound mail relay.
///
/// Email is best effort: callers log failures and move on, they never fail
/// the triggering operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError>;
}

/// Mailer that drops everything, for tests and mail-less deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), MailerError> {
        Ok(())
    }
}
