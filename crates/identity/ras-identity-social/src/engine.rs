//! Handshake engine: authorization URL construction and callback processing
//! for a single handshake record.

use crate::client::{self, OAuth2Client};
use crate::config::SocialConfig;
use crate::error::{SocialError, SocialResult};
use crate::record::{ClientConfig, HandshakeRecord};
use crate::registry::{ProviderDefinition, ProviderRegistry};
use crate::types::{ClientIdentity, LoginOutcome};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stateless driver of the OAuth2 steps; every call operates on one record.
#[derive(Clone)]
pub struct HandshakeEngine {
    registry: Arc<ProviderRegistry>,
    client: OAuth2Client,
    callback_timeout: Option<Duration>,
}

impl HandshakeEngine {
    pub fn new(registry: Arc<ProviderRegistry>, config: &SocialConfig) -> SocialResult<Self> {
        Ok(Self {
            registry,
            client: OAuth2Client::new(config)?,
            callback_timeout: config.callback_timeout(),
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// New record for `provider` with its default scopes and a fresh state
    /// token. Providers are validated when the redirect URL is built.
    pub fn configure(&self, provider: &str) -> HandshakeRecord {
        HandshakeRecord::new(provider, self.registry.default_scopes(provider))
    }

    /// Resolve the client configuration and render the authorization URL.
    pub fn redirect(
        &self,
        record: &mut HandshakeRecord,
        client: &ClientIdentity,
        redirect_url: &str,
    ) -> SocialResult<String> {
        let provider = self.registry.get(record.provider())?;
        client::validate_redirect_url(redirect_url)?;

        let config = ClientConfig {
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            redirect_url: redirect_url.to_string(),
            endpoint: provider.endpoint.clone(),
            scopes: record.scopes().to_vec(),
        };
        let auth_url = client::authorization_url(&config, record.state(), &provider.auth_params)?;
        record.set_client_config(config);

        debug!(
            "Generated authorization URL for provider {} (state {}...)",
            provider.name,
            record.state_hint()
        );
        Ok(auth_url)
    }

    /// Exchange `code`, fetch and map the profile, and run the enrichment
    /// hook. The token and profile are stored on `record` as they arrive.
    pub async fn handle_callback(
        &self,
        record: &mut HandshakeRecord,
        state: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> SocialResult<LoginOutcome> {
        if record.state() != state {
            return Err(SocialError::InvalidState);
        }
        let provider = self.registry.get(record.provider())?;
        let config = record
            .client_config()
            .cloned()
            .ok_or(SocialError::MissingClientConfig)?;

        let exchange = self.exchange_and_fetch(provider, &config, record, code);
        let bounded = async {
            match self.callback_timeout {
                Some(limit) => tokio::time::timeout(limit, exchange)
                    .await
                    .map_err(|_| SocialError::Cancelled)?,
                None => exchange.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Callback for provider {} cancelled", provider.name);
                Err(SocialError::Cancelled)
            }
            outcome = bounded => outcome,
        }
    }

    async fn exchange_and_fetch(
        &self,
        provider: &ProviderDefinition,
        config: &ClientConfig,
        record: &mut HandshakeRecord,
        code: &str,
    ) -> SocialResult<LoginOutcome> {
        let token = self.client.exchange_code(config, code).await?;
        record.set_token(token.clone())?;

        let authenticated = self.client.authenticated(token.clone());
        let user_info_url = provider.api.user_info_url(&token.access_token);
        let data: Map<String, Value> = authenticated.get_json(&user_info_url).await?;

        let mut user = provider.field_mapping.apply(data);
        if let Some(hook) = &provider.enrichment {
            if let Err(e) = hook.enrich(&provider.api, &authenticated, &mut user).await {
                warn!("Enrichment for provider {} failed: {}", provider.name, e);
            }
        }
        record.set_user_profile(user.clone())?;

        info!(
            "Successfully completed handshake for provider: {}",
            provider.name
        );
        Ok(LoginOutcome { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{OAuthEndpoint, ProfileField};
    use crate::registry::{ApiEndpoints, FieldMapping};
    use std::collections::HashMap;
    use url::Url;

    fn create_test_engine() -> HandshakeEngine {
        let registry = ProviderRegistry::new().register(
            ProviderDefinition::new(
                "google",
                OAuthEndpoint::new(
                    "https://accounts.google.com/o/oauth2/auth",
                    "https://oauth2.googleapis.com/token",
                ),
                ApiEndpoints::new("https://www.googleapis.com", "/oauth2/v2/userinfo"),
            )
            .with_default_scopes(["email", "profile"])
            .with_field_mapping(
                FieldMapping::new()
                    .map("id", ProfileField::Id)
                    .map("email", ProfileField::Email),
            )
            .with_auth_param("access_type", "offline"),
        );
        HandshakeEngine::new(Arc::new(registry), &SocialConfig::default()).unwrap()
    }

    #[test]
    fn test_configure_mints_fresh_state() {
        let engine = create_test_engine();
        let first = engine.configure("google");
        let second = engine.configure("google");

        assert_ne!(first.state(), second.state());
        assert_eq!(first.scopes(), ["email", "profile"]);
        assert!(engine.configure("unknown").scopes().is_empty());
    }

    #[test]
    fn test_redirect_builds_client_config() {
        let engine = create_test_engine();
        let mut record = engine.configure("google");
        record.extend_scopes(["openid"]).unwrap();

        let auth_url = engine
            .redirect(
                &mut record,
                &ClientIdentity::new("c1", "s1"),
                "https://app.example.com/cb",
            )
            .unwrap();

        let url = Url::parse(&auth_url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("state"), Some(&record.state().into()));
        assert_eq!(params.get("scope"), Some(&"email profile openid".into()));
        assert_eq!(params.get("access_type"), Some(&"offline".into()));

        let config = record.client_config().unwrap();
        assert_eq!(config.client_id, "c1");
        assert_eq!(config.scopes, vec!["email", "profile", "openid"]);
        assert_eq!(
            config.endpoint.token_url,
            "https://oauth2.googleapis.com/token"
        );
    }

    #[test]
    fn test_redirect_rejects_unknown_provider() {
        let engine = create_test_engine();
        let mut record = engine.configure("myspace");

        let result = engine.redirect(
            &mut record,
            &ClientIdentity::new("c1", "s1"),
            "https://app.example.com/cb",
        );
        assert!(matches!(result, Err(SocialError::InvalidProvider(_))));
        assert!(record.client_config().is_none());
    }

    #[test]
    fn test_redirect_rejects_bad_redirect_url() {
        let engine = create_test_engine();
        let mut record = engine.configure("google");

        let result = engine.redirect(&mut record, &ClientIdentity::new("c1", "s1"), "app/cb");
        assert!(matches!(
            result,
            Err(SocialError::InvalidRedirectUrl { .. })
        ));
        assert!(!record.is_redirected());
    }

    #[tokio::test]
    async fn test_callback_rejects_mismatched_state() {
        let engine = create_test_engine();
        let mut record = engine.configure("google");
        engine
            .redirect(
                &mut record,
                &ClientIdentity::new("c1", "s1"),
                "https://app.example.com/cb",
            )
            .unwrap();

        let result = engine
            .handle_callback(&mut record, "forged", "code", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SocialError::InvalidState)));
    }

    #[tokio::test]
    async fn test_callback_requires_redirect_first() {
        let engine = create_test_engine();
        let mut record = engine.configure("google");
        let state = record.state().to_string();

        let result = engine
            .handle_callback(&mut record, &state, "code", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SocialError::MissingClientConfig)));
    }
}
