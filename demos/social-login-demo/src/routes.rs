use crate::config::DemoConfig;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use ras_identity_social::{Dispatcher, LoginOutcome, LoginRequest, SocialError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<DemoConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
}

/// `SocialError` rendered as a JSON body with its HTTP status.
pub struct ApiError(SocialError);

impl From<SocialError> for ApiError {
    fn from(error: SocialError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.0.to_string() });
        (self.0.status_code(), Json(body)).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/{provider}", get(start_login))
        .route("/auth/{provider}/callback", get(complete_login))
        .with_state(state)
}

async fn start_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect, ApiError> {
    let client = state
        .config
        .clients
        .get(&provider)
        .cloned()
        .ok_or_else(|| SocialError::InvalidProvider(provider.clone()))?;

    let request = LoginRequest::new(&provider, client, state.config.callback_url(&provider));
    let auth_url = state.dispatcher.start_login(request).await?;
    Ok(Redirect::to(&auth_url))
}

async fn complete_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<LoginOutcome>, ApiError> {
    if let Some(error) = params.error {
        warn!("Provider {} returned error: {}", provider, error);
        return Err(SocialError::ExchangeFailed(error).into());
    }
    let (Some(login_state), Some(code)) = (params.state, params.code) else {
        return Err(SocialError::InvalidState.into());
    };

    // Only consume records that were started for this provider
    match state.dispatcher.pending(&login_state).await? {
        Some(record) if record.provider() == provider => {}
        _ => return Err(SocialError::InvalidState.into()),
    }

    let outcome = state.dispatcher.complete_login(&login_state, &code).await?;
    info!("User {} logged in with {}", outcome.user.id, provider);
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use ras_identity_social::{
        ClientIdentity, HandshakeEngine, InMemorySessionStore, ProviderRegistry, SocialConfig,
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn create_app() -> (Router, Dispatcher) {
        let engine = HandshakeEngine::new(
            Arc::new(ProviderRegistry::with_defaults()),
            &SocialConfig::default(),
        )
        .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(InMemorySessionStore::new()), engine);

        let mut clients = HashMap::new();
        clients.insert("google".to_string(), ClientIdentity::new("gid", "gsecret"));
        let config = DemoConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            redirect_base: "http://localhost:3000".to_string(),
            clients,
            redis_url: None,
            state_ttl_seconds: 600,
        };

        let router = create_router(AppState {
            dispatcher: dispatcher.clone(),
            config: Arc::new(config),
        });
        (router, dispatcher)
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_login_redirects_to_provider() {
        let (router, _) = create_app();
        let response = get(router, "/auth/google").await;

        assert!(response.status().is_redirection());
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(location.contains("client_id=gid"));
        assert!(location.contains("state="));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_bad_request() {
        let (router, _) = create_app();
        let response = get(router, "/auth/github").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_with_unknown_state() {
        let (router, _) = create_app();
        let response = get(router, "/auth/google/callback?state=nope&code=abc").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_for_other_provider_keeps_record() {
        let (router, dispatcher) = create_app();
        let request = LoginRequest::new(
            "google",
            ClientIdentity::new("gid", "gsecret"),
            "http://localhost:3000/auth/google/callback",
        );
        let auth_url = dispatcher.start_login(request).await.unwrap();
        let login_state = auth_url
            .split("state=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .to_string();

        let uri = format!("/auth/facebook/callback?state={}&code=abc", login_state);
        let response = get(router, &uri).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dispatcher.pending(&login_state).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let (router, _) = create_app();
        let response = get(router, "/auth/google/callback?error=access_denied").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
