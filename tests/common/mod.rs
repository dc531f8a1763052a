//! Shared fixtures: in-memory secrets and a router wired to a mock provider.
#![allow(dead_code, clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use base64ct::{Base64Url, Encoding};
use chrono::Duration;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tower::ServiceExt;
use tracegate::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState},
    },
    secrets::{
        CredentialError, FetchFuture, SecretSource, SecretStore, OAUTH_CLIENT_ID,
        OAUTH_CLIENT_SECRET, OAUTH_JWT_SECRET, SESSION_ENCRYPTION_KEY,
    },
    session::SessionData,
    upstream::{DownstreamClient, OAuthProvider, ProviderEndpoints, RetryingUpstreamClient},
};
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test-client.apps.example.com";
pub const CLIENT_SECRET: &str = "test-client-secret";

#[derive(Default)]
pub struct MemorySource {
    values: Mutex<HashMap<String, String>>,
    pub fetches: AtomicUsize,
}

impl MemorySource {
    pub fn with_defaults() -> Self {
        let source = Self::default();
        source.set(OAUTH_CLIENT_ID, CLIENT_ID);
        source.set(OAUTH_CLIENT_SECRET, CLIENT_SECRET);
        source.set(OAUTH_JWT_SECRET, "state-signing-secret");
        source.set(SESSION_ENCRYPTION_KEY, &Base64Url::encode_string(&[7u8; 32]));
        source
    }

    pub fn set(&self, name: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.values.lock().unwrap().remove(name);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SecretSource for MemorySource {
    fn fetch<'a>(&'a self, name: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.values
                .lock()
                .unwrap()
                .get(name)
                .map(|value| SecretString::from(value.clone()))
                .ok_or_else(|| CredentialError::NotFound(name.to_string()))
        })
    }
}

pub struct TestApp {
    pub provider: MockServer,
    pub source: Arc<MemorySource>,
    pub state: Arc<AuthState>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_source(MemorySource::with_defaults()).await
    }

    pub async fn with_source(source: MemorySource) -> Self {
        let provider = MockServer::start().await;
        let uri = provider.uri();
        let source = Arc::new(source);
        let secrets = Arc::new(SecretStore::new(source.clone()));

        let endpoints = ProviderEndpoints {
            authorize_url: format!("{uri}/o/oauth2/v2/auth"),
            token_url: format!("{uri}/token"),
            userinfo_url: format!("{uri}/userinfo"),
            tokeninfo_url: format!("{uri}/tokeninfo"),
            redirect_uri: "https://app.example.com/auth/callback".to_string(),
            scope: "openid email profile".to_string(),
        };
        let upstream = RetryingUpstreamClient::new(secrets.clone()).unwrap();
        let oauth = OAuthProvider::new(endpoints, upstream).unwrap();
        let downstream = DownstreamClient::new(format!("{uri}/v1/trace_metrics")).unwrap();

        let state = Arc::new(AuthState::new(
            AuthConfig::default(),
            secrets,
            oauth,
            downstream,
        ));

        Self {
            provider,
            source,
            state,
        }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    /// A valid `session_id` cookie header value for `user_id`.
    pub async fn session_cookie(&self, user_id: &str, access_token: Option<&str>) -> String {
        let token = self
            .state
            .sessions()
            .create(
                SessionData {
                    user_id: user_id.to_string(),
                    gaia_id: user_id.to_string(),
                    email: Some(format!("{user_id}@example.com")),
                    name: Some("Test User".to_string()),
                    picture: None,
                    access_token: access_token.map(ToString::to_string),
                    refresh_token: None,
                },
                Duration::hours(1),
            )
            .await
            .unwrap();
        format!("session_id={token}")
    }

    pub async fn state_token(&self) -> String {
        self.state.csrf().create(Duration::minutes(10)).await.unwrap()
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}
