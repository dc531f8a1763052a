//! Outbound HTTP: the OAuth provider and the downstream trace-metrics API.

pub mod client;
pub mod downstream;
pub mod provider;
pub mod retry;

pub use client::RetryingUpstreamClient;
pub use downstream::{DownstreamClient, DownstreamResponse};
pub use provider::{OAuthProvider, ProviderEndpoints, TokenInfo, TokenResponse, UserInfo};
pub use retry::RetryPolicy;

use crate::secrets::CredentialError;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}
