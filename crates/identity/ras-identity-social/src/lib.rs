//! Social login handshake coordination.
//!
//! This crate drives the OAuth2 authorization code flow for "log in with ..."
//! buttons. A [`Dispatcher`] issues an unguessable state token per login,
//! renders the provider's authorization URL, persists the in-flight
//! [`HandshakeRecord`] in a pluggable [`SessionStore`], and on callback
//! exchanges the code, fetches the user's profile and maps it into a
//! normalized [`UserProfile`]. Each state token is consumed exactly once.

mod client;
mod config;
mod dispatcher;
mod engine;
mod error;
pub mod providers;
mod record;
mod registry;
mod store;
mod types;


pub use client::{AuthenticatedClient, OAuth2Client, authorization_url, validate_redirect_url};
pub use config::SocialConfig;
pub use dispatcher::Dispatcher;
pub use engine::HandshakeEngine;
pub use error::{SocialError, SocialResult, StoreError, StoreResult};
pub use record::{
    ClientConfig, HandshakeRecord, OAuthEndpoint, ProfileField, Token, UserProfile,
    generate_state_token,
};
pub use registry::{
    ACCESS_TOKEN_PLACEHOLDER, ApiEndpoints, EnrichmentHook, FieldMapping, ProviderDefinition,
    ProviderRegistry, value_to_text,
};
pub use store::{InMemorySessionStore, SessionStore};
pub use types::{ClientIdentity, LoginOutcome, LoginRequest, TokenResponse};

// Re-exported so callers can cancel callbacks without a direct dependency
pub use tokio_util::sync::CancellationToken;
