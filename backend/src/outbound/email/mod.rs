//! SMTP mailer adapter.

mod smtp;

pub use smtp::{LettreMailer, SmtpConfig};
