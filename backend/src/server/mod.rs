//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::{AppConfig, ConfigError};
pub use state_builders::build_states;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Key, SameSite};
use actix_web::{App, HttpServer, web};
use tracing::warn;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use crate::inbound::http::health::{HealthState, liveness, readiness};
use crate::inbound::{http, ws};
use crate::middleware::Trace;
use crate::outbound::persistence::MemoryStore;

fn load_session_key(config: &AppConfig) -> std::io::Result<Key> {
    match std::fs::read(&config.session_key_file) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(error) => {
            if cfg!(debug_assertions) || config.session_allow_ephemeral {
                warn!(
                    path = %config.session_key_file,
                    %error,
                    "using temporary session key (dev only)"
                );
                Ok(Key::generate())
            } else {
                Err(std::io::Error::other(format!(
                    "failed to read session key at {}: {error}",
                    config.session_key_file
                )))
            }
        }
    }
}

/// Bind and run the server until shutdown.
pub async fn run(config: AppConfig) -> std::io::Result<()> {
    let key = load_session_key(&config)?;
    let cookie_secure = config.session_cookie_secure;

    let store = MemoryStore::new();
    let (http_state, registry) = build_states(&config, &store);
    let http_state = web::Data::new(http_state);
    let registry = web::Data::new(registry);
    let health_state = web::Data::new(HealthState::new());
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        let session = SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
            .cookie_name("session".to_owned())
            .cookie_path("/".to_owned())
            .cookie_secure(cookie_secure)
            .cookie_http_only(true)
            .cookie_same_site(SameSite::Lax)
            .build();

        #[allow(unused_mut)]
        let mut app = App::new()
            .app_data(server_health_state.clone())
            .app_data(http_state.clone())
            .app_data(registry.clone())
            .wrap(Trace)
            .wrap(session)
            .configure(http::configure_api)
            .service(ws::ws_entry)
            .service(liveness)
            .service(readiness);

        #[cfg(debug_assertions)]
        {
            app = app.service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", http::doc::ApiDoc::openapi()),
            );
        }

        app
    })
    .bind(config.bind_addr)?;

    health_state.mark_ready();
    server.run().await
}
