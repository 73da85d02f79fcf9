//! Provider registry: per-provider endpoints, scopes, field mapping and hooks.
//!
//! A registry is built once, wrapped in an `Arc`, and handed to the engine.
//! Nothing mutates it afterwards, so independently configured registries can
//! live side by side in one process.

use crate::client::AuthenticatedClient;
use crate::error::{SocialError, SocialResult};
use crate::record::{OAuthEndpoint, ProfileField, UserProfile};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Placeholder in a user-info path that is replaced by the access token.
pub const ACCESS_TOKEN_PLACEHOLDER: &str = "%ACCESS_TOKEN";

/// Provider-specific post-processing run after the base profile fetch.
#[async_trait]
pub trait EnrichmentHook: Send + Sync {
    async fn enrich(
        &self,
        api: &ApiEndpoints,
        client: &AuthenticatedClient,
        profile: &mut UserProfile,
    ) -> SocialResult<()>;
}

/// REST API location of a provider's user-info resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub base_url: String,
    /// May contain [`ACCESS_TOKEN_PLACEHOLDER`].
    pub user_info_path: String,
}

impl ApiEndpoints {
    pub fn new(base_url: impl Into<String>, user_info_path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_info_path: user_info_path.into(),
        }
    }

    pub fn user_info_url(&self, access_token: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.user_info_path
                .replace(ACCESS_TOKEN_PLACEHOLDER, access_token)
        )
    }
}

/// Provider field name to normalized profile field.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    fields: HashMap<String, ProfileField>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, provider_field: impl Into<String>, field: ProfileField) -> Self {
        self.fields.insert(provider_field.into(), field);
        self
    }

    pub fn get(&self, provider_field: &str) -> Option<ProfileField> {
        self.fields.get(provider_field).copied()
    }

    /// Build a profile from a decoded user-info object. Mapped fields are
    /// coerced to text; the whole object is kept as the raw bag.
    pub fn apply(&self, data: Map<String, Value>) -> UserProfile {
        let mut profile = UserProfile::default();
        for (key, value) in &data {
            let Some(field) = self.get(key) else {
                continue;
            };
            if let Some(text) = value_to_text(value) {
                field.set(&mut profile, text);
            }
        }
        profile.raw = data;
        profile
    }
}

/// Text form of a JSON value. Numbers keep their exact source digits; null
/// yields nothing.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Everything the engine needs to know about one provider.
#[derive(Clone)]
pub struct ProviderDefinition {
    pub name: String,
    pub default_scopes: Vec<String>,
    pub endpoint: OAuthEndpoint,
    pub api: ApiEndpoints,
    pub field_mapping: FieldMapping,
    /// Extra query parameters added to the authorization URL.
    pub auth_params: Vec<(String, String)>,
    pub enrichment: Option<Arc<dyn EnrichmentHook>>,
}

impl ProviderDefinition {
    pub fn new(name: impl Into<String>, endpoint: OAuthEndpoint, api: ApiEndpoints) -> Self {
        Self {
            name: name.into(),
            default_scopes: Vec::new(),
            endpoint,
            api,
            field_mapping: FieldMapping::new(),
            auth_params: Vec::new(),
            enrichment: None,
        }
    }

    pub fn with_default_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_field_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mapping = mapping;
        self
    }

    pub fn with_auth_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_params.push((key.into(), value.into()));
        self
    }

    /// Point the provider at another host, e.g. a GitHub Enterprise instance.
    pub fn with_endpoints(mut self, endpoint: OAuthEndpoint, api_base: impl Into<String>) -> Self {
        self.endpoint = endpoint;
        self.api.base_url = api_base.into();
        self
    }

    pub fn with_enrichment(mut self, hook: Arc<dyn EnrichmentHook>) -> Self {
        self.enrichment = Some(hook);
        self
    }
}

impl fmt::Debug for ProviderDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDefinition")
            .field("name", &self.name)
            .field("default_scopes", &self.default_scopes)
            .field("endpoint", &self.endpoint)
            .field("api", &self.api)
            .field("field_mapping", &self.field_mapping)
            .field("auth_params", &self.auth_params)
            .field("enrichment", &self.enrichment.is_some())
            .finish()
    }
}

/// Immutable lookup table of providers keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderDefinition>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in providers.
    pub fn with_defaults() -> Self {
        Self::new()
            .register(crate::providers::google())
            .register(crate::providers::github())
            .register(crate::providers::facebook())
    }

    /// Add or replace a provider.
    pub fn register(mut self, definition: ProviderDefinition) -> Self {
        self.providers.insert(definition.name.clone(), definition);
        self
    }

    pub fn get(&self, name: &str) -> SocialResult<&ProviderDefinition> {
        self.providers
            .get(name)
            .ok_or_else(|| SocialError::InvalidProvider(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Default scopes for a provider; empty when it is not registered.
    pub fn default_scopes(&self, name: &str) -> Vec<String> {
        self.providers
            .get(name)
            .map(|p| p.default_scopes.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
