//! OAuth2 protocol and dispatcher request/response types.

use crate::record::{Token, UserProfile};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth2 client credentials issued by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Everything needed to start one login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub provider: String,
    pub client: ClientIdentity,
    pub redirect_url: String,
    /// Appended to the provider's default scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl LoginRequest {
    pub fn new(
        provider: impl Into<String>,
        client: ClientIdentity,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            client,
            redirect_url: redirect_url.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }
}

/// Result of a completed handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub token: Token,
}

/// OAuth2 token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn into_token(self) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: self.refresh_token,
            expiry: self
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Error body returned by token endpoints (RFC 6749 section 5.2).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}
