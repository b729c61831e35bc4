//! Environment-driven application configuration.
//!
//! Every knob has a production-sensible default so a bare `backend` binary
//! comes up in a development shape; deployments override via environment
//! variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

use crate::domain::money::{Currency, Money};
use crate::domain::otp::{CODE_LENGTH, MAX_ATTEMPTS, OtpPolicy};
use crate::domain::pricing::PricingPolicy;
use crate::domain::tracking::TrackingPolicy;
use crate::domain::{BookingPolicy, WalletPolicy};
use crate::outbound::email::SmtpConfig;
use crate::outbound::payment::CardGatewayConfig;

/// Configuration problems that stop startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} is required outside debug builds")]
    Missing { name: &'static str },
}

/// Everything the server needs to wire itself.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub session_key_file: String,
    /// Allow a generated, process-local session key when the key file is
    /// absent. Forced on in debug builds.
    pub session_allow_ephemeral: bool,
    pub session_cookie_secure: bool,
    pub webhook_secret: String,
    pub booking_policy: BookingPolicy,
    pub wallet_policy: WalletPolicy,
    /// Card processor settings; absent means the approve-all fixture.
    pub card_gateway: Option<CardGatewayConfig>,
    /// SMTP relay settings; absent disables notification email.
    pub smtp: Option<SmtpConfig>,
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn flag(name: &'static str, default: bool) -> bool {
    env::var(name).map(|value| value != "0").unwrap_or(default)
}

impl AppConfig {
    /// Read the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let webhook_secret = match env::var("WEBHOOK_SECRET") {
            Ok(secret) => secret,
            Err(_) if cfg!(debug_assertions) => "dev-webhook-secret".to_owned(),
            Err(_) => {
                return Err(ConfigError::Missing {
                    name: "WEBHOOK_SECRET",
                });
            }
        };

        let currency = Currency::new(env::var("CURRENCY").unwrap_or_else(|_| "inr".to_owned()));
        let platform_fee_pct: f64 = parse_var("PLATFORM_FEE_PCT", 15.0)?;
        if !(0.0..=100.0).contains(&platform_fee_pct) {
            return Err(ConfigError::Invalid {
                name: "PLATFORM_FEE_PCT",
                value: platform_fee_pct.to_string(),
            });
        }
        let booking_policy = BookingPolicy {
            pricing: PricingPolicy {
                // The float percentage is configuration only; internally the
                // fee is integer basis points.
                platform_fee_bps: (platform_fee_pct * 100.0).round() as u32,
                max_service_radius_km: parse_var("MAX_SERVICE_RADIUS_KM", 50.0)?,
                currency: currency.clone(),
            },
            tracking: TrackingPolicy::default(),
            otp: OtpPolicy {
                length: parse_var("OTP_LENGTH", CODE_LENGTH)?,
                validity: TimeDelta::hours(parse_var("OTP_EXPIRY_HOURS", 24)?),
                max_attempts: parse_var("OTP_MAX_ATTEMPTS", MAX_ATTEMPTS)?,
                lockout: TimeDelta::minutes(parse_var("OTP_LOCKOUT_MINUTES", 30)?),
                resend_cooldown: TimeDelta::seconds(parse_var("OTP_RESEND_COOLDOWN_SEC", 60)?),
            },
            cash_collected_before_verify: flag("CASH_COLLECTED_BEFORE_VERIFY", false),
            operation_deadline: Duration::from_secs(parse_var("REQUEST_TIMEOUT_SEC", 30)?),
        };
        // MIN_PAYOUT is given in major units (rupees), stored in minor.
        let wallet_policy = WalletPolicy {
            min_payout: Money::from_minor(parse_var::<i64>("MIN_PAYOUT", 500)? * 100),
            currency,
        };

        let card_gateway = match (env::var("CARD_GATEWAY_URL"), env::var("CARD_GATEWAY_KEY")) {
            (Ok(base_url), Ok(api_key)) => Some(CardGatewayConfig {
                base_url,
                api_key,
                timeout: Duration::from_millis(parse_var("CARD_GATEWAY_TIMEOUT_MS", 10_000)?),
            }),
            _ => None,
        };

        let smtp = match (
            env::var("SMTP_HOST"),
            env::var("SMTP_USERNAME"),
            env::var("SMTP_PASSWORD"),
            env::var("SMTP_SENDER"),
        ) {
            (Ok(host), Ok(username), Ok(password), Ok(sender)) => Some(SmtpConfig {
                host,
                username,
                password,
                sender,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            session_key_file: env::var("SESSION_KEY_FILE")
                .unwrap_or_else(|_| "/var/run/secrets/session_key".to_owned()),
            session_allow_ephemeral: flag("SESSION_ALLOW_EPHEMERAL", false),
            session_cookie_secure: flag("SESSION_COOKIE_SECURE", true),
            webhook_secret,
            booking_policy,
            wallet_policy,
            card_gateway,
            smtp,
        })
    }
}
