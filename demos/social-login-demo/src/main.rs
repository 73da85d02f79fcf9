//! Social login demo server.
//!
//! Configure providers through `<PROVIDER>_CLIENT_ID` / `<PROVIDER>_CLIENT_SECRET`
//! (a `.env` file is loaded when present), then open
//! `http://localhost:3000/auth/google` in a browser.

mod config;
mod routes;

use crate::config::DemoConfig;
use crate::routes::{AppState, create_router};
use anyhow::Result;
use ras_identity_social::{
    Dispatcher, HandshakeEngine, InMemorySessionStore, ProviderRegistry, SessionStore,
    SocialConfig,
};
use ras_identity_social_redis::RedisSessionStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_login_demo=debug,ras_identity_social=debug".into()),
        )
        .init();

    let registry = Arc::new(ProviderRegistry::with_defaults());
    let config = DemoConfig::from_env(registry.names())?;
    if config.clients.is_empty() {
        warn!("No provider credentials configured; every login will be rejected");
    }

    let store = create_store(&config)?;
    let social_config = SocialConfig::default().with_user_agent("social-login-demo/0.1");
    let engine = HandshakeEngine::new(registry, &social_config)?;

    let state = AppState {
        dispatcher: Dispatcher::new(store, engine),
        config: Arc::new(config.clone()),
    };
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Social login demo listening on http://{}", config.bind_addr);
    for provider in config.clients.keys() {
        info!("  {}/auth/{}", config.redirect_base, provider);
    }

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_store(config: &DemoConfig) -> Result<Arc<dyn SessionStore>> {
    if let Some(url) = &config.redis_url {
        info!("Using Redis session store");
        let store = RedisSessionStore::new(url.as_str())?
            .with_expiration(Duration::from_secs(config.state_ttl_seconds));
        return Ok(Arc::new(store));
    }

    info!("Using in-memory session store");
    let store = InMemorySessionStore::new().with_ttl(config.state_ttl_seconds);

    let sweeper = store.clone();
    let period = Duration::from_secs(config.state_ttl_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = sweeper.cleanup_expired().await;
            if evicted > 0 {
                info!("Evicted {} expired login attempts", evicted);
            }
        }
    });

    Ok(Arc::new(store))
}
