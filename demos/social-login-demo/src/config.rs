//! Environment-driven configuration for the demo server.

use anyhow::{Context, Result, bail};
use ras_identity_social::ClientIdentity;
use std::collections::HashMap;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_REDIRECT_BASE: &str = "http://localhost:3000";
const DEFAULT_STATE_TTL_SECONDS: u64 = 600;
const MAX_STATE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub bind_addr: String,
    /// Public base URL the providers redirect back to.
    pub redirect_base: String,
    /// Credentials per provider name. Providers without both variables set are left out.
    pub clients: HashMap<String, ClientIdentity>,
    pub redis_url: Option<String>,
    pub state_ttl_seconds: u64,
}

impl DemoConfig {
    pub fn from_env<'a>(providers: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        Self::from_lookup(providers, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<'a, F>(providers: impl IntoIterator<Item = &'a str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut clients = HashMap::new();
        for provider in providers {
            let prefix = provider.to_uppercase();
            let id = lookup(&format!("{}_CLIENT_ID", prefix));
            let secret = lookup(&format!("{}_CLIENT_SECRET", prefix));
            if let (Some(id), Some(secret)) = (id, secret) {
                clients.insert(provider.to_string(), ClientIdentity::new(id, secret));
            }
        }

        let state_ttl_seconds = match lookup("SOCIAL_STATE_TTL_SECONDS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SOCIAL_STATE_TTL_SECONDS is not a number: {}", raw))?,
            None => DEFAULT_STATE_TTL_SECONDS,
        };
        if !(1..=MAX_STATE_TTL_SECONDS).contains(&state_ttl_seconds) {
            bail!(
                "SOCIAL_STATE_TTL_SECONDS must be between 1 and {}, got {}",
                MAX_STATE_TTL_SECONDS,
                state_ttl_seconds
            );
        }

        Ok(Self {
            bind_addr: lookup("SOCIAL_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            redirect_base: lookup("SOCIAL_REDIRECT_BASE")
                .unwrap_or_else(|| DEFAULT_REDIRECT_BASE.to_string()),
            clients,
            redis_url: lookup("SOCIAL_REDIS_URL").filter(|url| !url.is_empty()),
            state_ttl_seconds,
        })
    }

    pub fn callback_url(&self, provider: &str) -> String {
        format!(
            "{}/auth/{}/callback",
            self.redirect_base.trim_end_matches('/'),
            provider
        )
    }
}
