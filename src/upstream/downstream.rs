use super::{UpstreamError, DOWNSTREAM_TIMEOUT};
use crate::APP_USER_AGENT;
use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{error, instrument};

pub const DEFAULT_DOWNSTREAM_URL: &str = "https://brush-googleapis.corp.google.com/v1/trace_metrics";

/// A successful downstream answer, relayed to the caller as is.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Client for the trace-metrics API, called on behalf of the user.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    http: Client,
    url: String,
}

impl DownstreamClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DOWNSTREAM_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` to the trace-metrics API with the user's access token.
    ///
    /// # Errors
    /// Returns `UpstreamError::Status` with the downstream status and body
    /// for a non-2xx answer, `Transport` on network failure and
    /// `InvalidResponse` if a 2xx body is not JSON.
    #[instrument(skip(self, access_token, body))]
    pub async fn trace_metrics(
        &self,
        access_token: &str,
        body: &Value,
    ) -> Result<DownstreamResponse, UpstreamError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Trace metrics request failed with {status}: {text}");
            return Err(UpstreamError::Status { status, body: text });
        }

        let body = serde_json::from_str(&text)
            .map_err(|err| UpstreamError::InvalidResponse(err.to_string()))?;

        Ok(DownstreamResponse { status, body })
    }
}
