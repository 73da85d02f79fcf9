//! Social login error types.

use http::StatusCode;
use thiserror::Error;

pub type SocialResult<T> = Result<T, SocialError>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by a [`SessionStore`](crate::SessionStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Provider not registered: {0}")]
    InvalidProvider(String),

    #[error("Redirect URL <{url}> not valid: {reason}")]
    InvalidRedirectUrl { url: String, reason: String },

    /// Unknown, already consumed, or mismatched state token. The three cases
    /// are deliberately reported the same way.
    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("User info request failed: {0}")]
    ProfileFetchFailed(String),

    #[error("Invalid user info response: {0}")]
    ProfileDecodeFailed(#[source] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Provider call cancelled")]
    Cancelled,

    #[error("Scopes cannot change after the redirect URL has been generated")]
    ScopesFrozen,

    /// Redirected records belong to the callback path and are never re-persisted.
    #[error("Handshake record was already redirected and cannot be updated")]
    AlreadyRedirected,

    #[error("Handshake has no client configuration")]
    MissingClientConfig,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SocialError {
    /// True for failures caused by how the login was requested rather than by
    /// the provider or the store.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SocialError::InvalidProvider(_) | SocialError::InvalidRedirectUrl { .. }
        )
    }

    /// HTTP status a hosting application should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SocialError::InvalidProvider(_)
            | SocialError::InvalidRedirectUrl { .. }
            | SocialError::InvalidState
            | SocialError::ScopesFrozen
            | SocialError::MissingClientConfig => StatusCode::BAD_REQUEST,
            SocialError::ExchangeFailed(_)
            | SocialError::ProfileFetchFailed(_)
            | SocialError::ProfileDecodeFailed(_) => StatusCode::BAD_GATEWAY,
            SocialError::AlreadyRedirected => StatusCode::CONFLICT,
            SocialError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            SocialError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            SocialError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
