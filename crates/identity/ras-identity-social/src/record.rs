//! Handshake record: the persisted state of one login attempt.

use crate::error::{SocialError, SocialResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::{RngCore, thread_rng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw bytes of entropy behind every state token.
const STATE_TOKEN_BYTES: usize = 32;

/// Mint a fresh anti-forgery state token (256 bits, URL-safe base64).
pub fn generate_state_token() -> String {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Authorization and token endpoints of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthEndpoint {
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthEndpoint {
    pub fn new(auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
        }
    }
}

/// OAuth2 client configuration resolved when the redirect URL is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub endpoint: OAuthEndpoint,
    pub scopes: Vec<String>,
}

/// OAuth2 access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| Utc::now() >= expiry)
    }
}

/// Normalized user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    /// Every field the provider returned, untouched.
    pub raw: Map<String, Value>,
}

/// Normalized profile field a provider field can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Id,
    Username,
    FirstName,
    LastName,
    FullName,
    Email,
    Avatar,
}

impl ProfileField {
    pub fn set(self, profile: &mut UserProfile, value: String) {
        let slot = match self {
            ProfileField::Id => &mut profile.id,
            ProfileField::Username => &mut profile.username,
            ProfileField::FirstName => &mut profile.first_name,
            ProfileField::LastName => &mut profile.last_name,
            ProfileField::FullName => &mut profile.full_name,
            ProfileField::Email => &mut profile.email,
            ProfileField::Avatar => &mut profile.avatar,
        };
        *slot = value;
    }

    pub fn get(self, profile: &UserProfile) -> &str {
        match self {
            ProfileField::Id => &profile.id,
            ProfileField::Username => &profile.username,
            ProfileField::FirstName => &profile.first_name,
            ProfileField::LastName => &profile.last_name,
            ProfileField::FullName => &profile.full_name,
            ProfileField::Email => &profile.email,
            ProfileField::Avatar => &profile.avatar,
        }
    }
}

/// One login attempt, from `start_login` until its callback is consumed.
///
/// Serializes to the persisted record format (`driver`, `state`, `scopes`,
/// `conf`, `user`, `token`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRecord {
    #[serde(rename = "driver")]
    provider: String,
    state: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(rename = "conf", default)]
    client_config: Option<ClientConfig>,
    #[serde(rename = "user", default)]
    user_profile: Option<UserProfile>,
    #[serde(default)]
    token: Option<Token>,
}

impl HandshakeRecord {
    /// New pending record with a freshly minted state token.
    pub fn new(provider: impl Into<String>, default_scopes: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            state: generate_state_token(),
            scopes: default_scopes,
            client_config: None,
            user_profile: None,
            token: None,
        }
    }

    /// Rebuild a record from its parts, e.g. in a storage backend or a test.
    pub fn from_parts(
        provider: impl Into<String>,
        state: impl Into<String>,
        scopes: Vec<String>,
        client_config: Option<ClientConfig>,
        user_profile: Option<UserProfile>,
        token: Option<Token>,
    ) -> Self {
        Self {
            provider: provider.into(),
            state: state.into(),
            scopes,
            client_config,
            user_profile,
            token,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn client_config(&self) -> Option<&ClientConfig> {
        self.client_config.as_ref()
    }

    pub fn user_profile(&self) -> Option<&UserProfile> {
        self.user_profile.as_ref()
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Redirect URL already issued for this record.
    pub fn is_redirected(&self) -> bool {
        self.client_config.is_some()
    }

    /// Append scopes. Duplicates are kept; rejected once the redirect URL exists.
    pub fn extend_scopes<I, S>(&mut self, scopes: I) -> SocialResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.is_redirected() {
            return Err(SocialError::ScopesFrozen);
        }
        self.scopes.extend(scopes.into_iter().map(Into::into));
        Ok(())
    }

    pub(crate) fn set_client_config(&mut self, config: ClientConfig) {
        self.client_config = Some(config);
    }

    pub(crate) fn set_token(&mut self, token: Token) -> SocialResult<()> {
        if self.client_config.is_none() {
            return Err(SocialError::MissingClientConfig);
        }
        self.token = Some(token);
        Ok(())
    }

    pub(crate) fn set_user_profile(&mut self, profile: UserProfile) -> SocialResult<()> {
        if self.client_config.is_none() {
            return Err(SocialError::MissingClientConfig);
        }
        self.user_profile = Some(profile);
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Short, log-safe prefix of the state token.
    pub(crate) fn state_hint(&self) -> &str {
        state_hint(&self.state)
    }
}

pub(crate) fn state_hint(state: &str) -> &str {
    state.get(..8).unwrap_or(state)
}

/// Records are equal when provider, state, token fields, client identity and
/// scopes (in order) match. Profiles are not compared.
impl PartialEq for HandshakeRecord {
    fn eq(&self, other: &Self) -> bool {
        let tokens_match = match (&self.token, &other.token) {
            (Some(a), Some(b)) => {
                a.access_token == b.access_token
                    && a.refresh_token == b.refresh_token
                    && a.expiry == b.expiry
            }
            (None, None) => true,
            _ => false,
        };
        let configs_match = match (&self.client_config, &other.client_config) {
            (Some(a), Some(b)) => {
                a.client_id == b.client_id
                    && a.client_secret == b.client_secret
                    && a.redirect_url == b.redirect_url
            }
            (None, None) => true,
            _ => false,
        };

        self.provider == other.provider
            && self.state == other.state
            && tokens_match
            && configs_match
            && self.scopes == other.scopes
    }
}
