//! Social login configuration types.

use std::time::Duration;

/// Runtime settings for the handshake engine's outbound HTTP calls.
#[derive(Debug, Clone)]
pub struct SocialConfig {
    /// Per-request timeout applied by the HTTP client. Expiry surfaces as
    /// `SocialError::Cancelled`.
    pub http_timeout_seconds: u64,
    /// Deadline for the whole callback sequence (exchange, profile fetch,
    /// enrichment). `None` disables it.
    pub callback_timeout_seconds: Option<u64>,
    pub user_agent: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            http_timeout_seconds: 30,
            callback_timeout_seconds: Some(60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SocialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn with_callback_timeout(mut self, seconds: Option<u64>) -> Self {
        self.callback_timeout_seconds = seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub(crate) fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_seconds.map(Duration::from_secs)
    }
}
