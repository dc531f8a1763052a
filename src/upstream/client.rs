use super::{RetryPolicy, UpstreamError, PROVIDER_TIMEOUT};
use crate::{
    secrets::{SecretStore, OAUTH_CLIENT_ID, OAUTH_CLIENT_SECRET},
    APP_USER_AGENT,
};
use anyhow::Result;
use reqwest::{Client, Method, Response};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info_span, instrument, warn, Instrument};

/// HTTP client for provider calls authenticated with the OAuth client
/// credentials, tolerant to credential rotation.
#[derive(Debug, Clone)]
pub struct RetryingUpstreamClient {
    http: Client,
    secrets: Arc<SecretStore>,
}

impl RetryingUpstreamClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(secrets: Arc<SecretStore>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(PROVIDER_TIMEOUT)
            .build()?;

        Ok(Self { http, secrets })
    }

    /// Send `form` to `url` with `client_id` and `client_secret` added.
    ///
    /// Each attempt resolves the credentials from the secret store. A 401
    /// with attempts left evicts both credentials and tries again.
    ///
    /// # Errors
    /// Returns `UpstreamError::Status` for a non-success response once no
    /// retry applies, `Transport` for network failures and timeouts, and
    /// `Credential` if the credentials cannot be resolved.
    #[instrument(skip(self, form))]
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        form: &[(&str, &str)],
        policy: RetryPolicy,
    ) -> Result<Response, UpstreamError> {
        let mut attempt = 1;

        loop {
            let client_id = self.secrets.get(OAUTH_CLIENT_ID).await?;
            let client_secret = self.secrets.get(OAUTH_CLIENT_SECRET).await?;

            let mut payload = form.to_vec();
            payload.push(("client_id", client_id.expose_secret()));
            payload.push(("client_secret", client_secret.expose_secret()));

            let span = info_span!(
                "provider.request",
                http.method = %method,
                url = %url,
                attempt
            );
            let response = self
                .http
                .request(method.clone(), url)
                .form(&payload)
                .send()
                .instrument(span)
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if policy.should_retry(attempt, status) {
                warn!(
                    "Provider request failed with {status}, clearing credentials and retrying (attempt {attempt}/{})",
                    policy.max_attempts()
                );
                self.secrets.invalidate(OAUTH_CLIENT_ID).await;
                self.secrets.invalidate(OAUTH_CLIENT_SECRET).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }
    }
}
