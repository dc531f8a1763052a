use super::{RetryPolicy, RetryingUpstreamClient, UpstreamError, PROVIDER_TIMEOUT};
use crate::APP_USER_AGENT;
use anyhow::Result;
use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const DEFAULT_REDIRECT_URI: &str = "https://brush-corprun-dev.gclb.goog/auth/callback";
pub const DEFAULT_SCOPE: &str = "openid email profile";

/// Where the identity provider lives and how this client is registered with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub tokeninfo_url: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            tokeninfo_url: DEFAULT_TOKENINFO_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserInfo {
    /// The stable subject: `sub` (OpenID Connect) or else `id` (legacy v2).
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.sub
            .as_deref()
            .filter(|sub| !sub.is_empty())
            .or_else(|| self.id.as_deref().filter(|id| !id.is_empty()))
    }
}

/// Token introspection result. Only the fields used for identity are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthProvider {
    endpoints: ProviderEndpoints,
    upstream: RetryingUpstreamClient,
    http: Client,
}

impl OAuthProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoints: ProviderEndpoints, upstream: RetryingUpstreamClient) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(PROVIDER_TIMEOUT)
            .build()?;

        Ok(Self {
            endpoints,
            upstream,
            http,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    /// Build the URL the user agent is sent to for consent.
    ///
    /// # Errors
    /// Returns an error if the configured authorize URL is not a valid URL.
    pub fn authorization_url(&self, client_id: &str, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.endpoints.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.endpoints.scope.as_str()),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
    }

    /// Trade an authorization code for tokens.
    ///
    /// # Errors
    /// Returns an error if the exchange fails after retries or the response
    /// lacks an access token.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, UpstreamError> {
        let response = self
            .upstream
            .call(
                Method::POST,
                &self.endpoints.token_url,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.endpoints.redirect_uri.as_str()),
                ],
                RetryPolicy::default(),
            )
            .await?;

        json(response).await
    }

    /// # Errors
    /// Returns an error on transport failure, non-2xx, or an unreadable body.
    #[instrument(skip(self, access_token))]
    pub async fn userinfo(&self, access_token: &str) -> Result<UserInfo, UpstreamError> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        json(success(response).await?).await
    }

    /// Introspect a bearer token issued by the provider.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-200, or an unreadable body.
    #[instrument(skip(self, token))]
    pub async fn tokeninfo(&self, token: &str) -> Result<TokenInfo, UpstreamError> {
        let response = self
            .http
            .get(&self.endpoints.tokeninfo_url)
            .query(&[("access_token", token)])
            .send()
            .await?;

        json(success(response).await?).await
    }
}

async fn success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!("Provider answered {status}: {body}");
    Err(UpstreamError::Status { status, body })
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| UpstreamError::InvalidResponse(err.to_string()))
}
