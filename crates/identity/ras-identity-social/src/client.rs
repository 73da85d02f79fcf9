//! OAuth2 protocol calls: authorization URL, code exchange, authenticated GETs.

use crate::config::SocialConfig;
use crate::error::{SocialError, SocialResult};
use crate::record::{ClientConfig, Token};
use crate::types::{TokenErrorResponse, TokenResponse};
use reqwest::{Client, RequestBuilder, header};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use url::Url;

/// Check that a redirect target is an absolute http(s) URL.
pub fn validate_redirect_url(redirect_url: &str) -> SocialResult<Url> {
    let invalid = |reason: String| SocialError::InvalidRedirectUrl {
        url: redirect_url.to_string(),
        reason,
    };

    let url = Url::parse(redirect_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("protocol not valid".to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Authorization URL for the code flow, carrying `state` as the CSRF parameter.
pub fn authorization_url(
    config: &ClientConfig,
    state: &str,
    auth_params: &[(String, String)],
) -> SocialResult<String> {
    let mut url = Url::parse(&config.endpoint.auth_url)
        .map_err(|e| SocialError::Config(format!("authorization endpoint: {e}")))?;

    let mut params = url.query_pairs_mut();
    params.append_pair("response_type", "code");
    params.append_pair("client_id", &config.client_id);
    params.append_pair("redirect_uri", &config.redirect_url);
    if !config.scopes.is_empty() {
        params.append_pair("scope", &config.scopes.join(" "));
    }
    params.append_pair("state", state);
    for (key, value) in auth_params {
        params.append_pair(key, value);
    }
    drop(params);

    Ok(url.to_string())
}

/// Request timeouts are reported like the callback deadline.
fn transport_error(e: reqwest::Error, kind: fn(String) -> SocialError) -> SocialError {
    if e.is_timeout() {
        SocialError::Cancelled
    } else {
        kind(e.to_string())
    }
}

/// HTTP client for the token endpoint.
#[derive(Clone)]
pub struct OAuth2Client {
    http_client: Client,
}

impl OAuth2Client {
    pub fn new(config: &SocialConfig) -> SocialResult<Self> {
        let http_client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SocialError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http_client })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, config: &ClientConfig, code: &str) -> SocialResult<Token> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
        ];

        let response = self
            .http_client
            .post(&config.endpoint.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| transport_error(e, SocialError::ExchangeFailed))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, SocialError::ExchangeFailed))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("{status}: {body}"),
            };
            error!("Token exchange failed: {}", message);
            return Err(SocialError::ExchangeFailed(message));
        }

        // Some providers answer 200 with an error body.
        if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
            error!("Token exchange rejected: {}", err.error);
            return Err(SocialError::ExchangeFailed(err.error));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SocialError::ExchangeFailed(format!("invalid token response: {e}")))?;

        info!("Successfully exchanged code for tokens");
        Ok(token_response.into_token())
    }

    /// Client that authenticates every request with `token`.
    pub fn authenticated(&self, token: Token) -> AuthenticatedClient {
        AuthenticatedClient {
            http_client: self.http_client.clone(),
            token,
        }
    }
}

/// HTTP client bound to a provider access token; handed to enrichment hooks.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http_client: Client,
    token: Token,
}

impl AuthenticatedClient {
    /// GET request carrying the bearer token.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http_client
            .get(url)
            .bearer_auth(&self.token.access_token)
            .header(header::ACCEPT, "application/json")
    }

    /// GET `url` and decode the JSON body. Numbers keep their exact digits.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SocialResult<T> {
        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(e, SocialError::ProfileFetchFailed))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("User info request failed: {} {}", status, error_text);
            return Err(SocialError::ProfileFetchFailed(format!(
                "{status}: {error_text}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, SocialError::ProfileFetchFailed))?;
        // Query strings may carry the access token
        let path = url.split('?').next().unwrap_or(url);
        debug!("Retrieved {} byte response from {}", body.len(), path);

        serde_json::from_slice(&body).map_err(SocialError::ProfileDecodeFailed)
    }
}
