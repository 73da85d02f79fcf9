//! Built-in provider definitions.

use crate::client::AuthenticatedClient;
use crate::error::SocialResult;
use crate::record::{OAuthEndpoint, ProfileField, UserProfile};
use crate::registry::{ApiEndpoints, EnrichmentHook, FieldMapping, ProviderDefinition};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn google() -> ProviderDefinition {
    ProviderDefinition::new(
        "google",
        OAuthEndpoint::new(
            "https://accounts.google.com/o/oauth2/auth",
            "https://oauth2.googleapis.com/token",
        ),
        ApiEndpoints::new("https://www.googleapis.com", "/oauth2/v2/userinfo"),
    )
    .with_default_scopes(["profile", "email"])
    .with_field_mapping(
        FieldMapping::new()
            .map("id", ProfileField::Id)
            .map("email", ProfileField::Email)
            .map("name", ProfileField::FullName)
            .map("given_name", ProfileField::FirstName)
            .map("family_name", ProfileField::LastName)
            .map("picture", ProfileField::Avatar),
    )
}

pub fn github() -> ProviderDefinition {
    ProviderDefinition::new(
        "github",
        OAuthEndpoint::new(
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
        ),
        ApiEndpoints::new("https://api.github.com", "/user"),
    )
    .with_default_scopes(["user:email"])
    .with_field_mapping(
        FieldMapping::new()
            .map("id", ProfileField::Id)
            .map("login", ProfileField::Username)
            .map("name", ProfileField::FullName)
            .map("email", ProfileField::Email)
            .map("avatar_url", ProfileField::Avatar),
    )
    .with_enrichment(Arc::new(GithubPrimaryEmail))
}

pub fn facebook() -> ProviderDefinition {
    ProviderDefinition::new(
        "facebook",
        OAuthEndpoint::new(
            "https://www.facebook.com/v18.0/dialog/oauth",
            "https://graph.facebook.com/v18.0/oauth/access_token",
        ),
        ApiEndpoints::new(
            "https://graph.facebook.com",
            "/me?fields=id,name,first_name,last_name,email,picture&access_token=%ACCESS_TOKEN",
        ),
    )
    .with_default_scopes(["email"])
    .with_field_mapping(
        FieldMapping::new()
            .map("id", ProfileField::Id)
            .map("name", ProfileField::FullName)
            .map("first_name", ProfileField::FirstName)
            .map("last_name", ProfileField::LastName)
            .map("email", ProfileField::Email),
    )
    .with_enrichment(Arc::new(FacebookPicture))
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

/// GitHub hides private emails from `/user`; look up the primary one.
pub struct GithubPrimaryEmail;

#[async_trait]
impl EnrichmentHook for GithubPrimaryEmail {
    async fn enrich(
        &self,
        api: &ApiEndpoints,
        client: &AuthenticatedClient,
        profile: &mut UserProfile,
    ) -> SocialResult<()> {
        if !profile.email.is_empty() {
            return Ok(());
        }

        let url = format!("{}/user/emails", api.base_url);
        let emails: Vec<GithubEmail> = client.get_json(&url).await?;
        if let Some(primary) = emails.into_iter().find(|e| e.primary && e.verified) {
            debug!("Using primary GitHub email");
            profile.email = primary.email;
        }
        Ok(())
    }
}

/// Facebook nests the avatar under `picture.data.url`.
pub struct FacebookPicture;

#[async_trait]
impl EnrichmentHook for FacebookPicture {
    async fn enrich(
        &self,
        _api: &ApiEndpoints,
        _client: &AuthenticatedClient,
        profile: &mut UserProfile,
    ) -> SocialResult<()> {
        let url = profile
            .raw
            .get("picture")
            .and_then(|p| p.pointer("/data/url"))
            .and_then(|u| u.as_str())
            .map(String::from);
        if let Some(url) = url {
            profile.avatar = url;
        }
        Ok(())
    }
}
