//! Mailer over an SMTP relay via `lettre`.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::ports::{EmailMessage, Mailer, MailerError};

/// Relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// `From` address on every message, e.g. `noreply@example.in`.
    pub sender: String,
}

/// [`Mailer`] implementation over an async SMTP transport.
#[derive(Debug, Clone)]
pub struct LettreMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl LettreMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, MailerError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| MailerError::transport(error.to_string()))?
            .credentials(Credentials::new(config.username, config.password))
            .build();
        let sender = config
            .sender
            .parse::<Mailbox>()
            .map_err(|error| MailerError::compose(format!("bad sender address: {error}")))?;
        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Mailer for LettreMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|error| MailerError::compose(format!("bad recipient address: {error}")))?;
        let email = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(&message.subject)
            .body(message.body.clone())
            .map_err(|error| MailerError::compose(error.to_string()))?;
        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|error| MailerError::transport(error.to_string()))
    }
}
