//! Auth configuration and the shared state handed to handlers.

use crate::{
    secrets::SecretStore,
    session::{CsrfStateCodec, SessionCodec},
    upstream::{DownstreamClient, OAuthProvider},
};
use chrono::Duration;
use std::sync::Arc;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_STATE_TTL_SECONDS: i64 = 10 * 60;
pub const DEFAULT_APP_ENTRY: &str = "/brush.html";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    app_entry: String,
    session_ttl_seconds: i64,
    state_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_APP_ENTRY.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(app_entry: String) -> Self {
        Self {
            app_entry,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_state_ttl_seconds(mut self, seconds: i64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    /// Where the browser lands after sign-in and on `/`.
    #[must_use]
    pub fn app_entry(&self) -> &str {
        &self.app_entry
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn session_ttl(&self) -> Duration {
        saturating_seconds(self.session_ttl_seconds)
    }

    pub(crate) fn state_ttl(&self) -> Duration {
        saturating_seconds(self.state_ttl_seconds)
    }
}

// Out-of-range values clamp; the codecs then refuse the expiry.
fn saturating_seconds(seconds: i64) -> Duration {
    Duration::try_seconds(seconds).unwrap_or(if seconds < 0 {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

pub struct AuthState {
    config: AuthConfig,
    secrets: Arc<SecretStore>,
    sessions: SessionCodec,
    csrf: CsrfStateCodec,
    provider: OAuthProvider,
    downstream: DownstreamClient,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        secrets: Arc<SecretStore>,
        provider: OAuthProvider,
        downstream: DownstreamClient,
    ) -> Self {
        Self {
            config,
            sessions: SessionCodec::new(secrets.clone()),
            csrf: CsrfStateCodec::new(secrets.clone()),
            secrets,
            provider,
            downstream,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }

    #[must_use]
    pub fn csrf(&self) -> &CsrfStateCodec {
        &self.csrf
    }

    #[must_use]
    pub fn provider(&self) -> &OAuthProvider {
        &self.provider
    }

    #[must_use]
    pub fn downstream(&self) -> &DownstreamClient {
        &self.downstream
    }
}
