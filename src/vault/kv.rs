//! Vault KV v2 as the backing store for named secrets.
//!
//! Each secret lives at `{mount}/data/{path}/{name}` and holds its value in
//! the `value` field of the latest version.
//!
//! The Vault token is kept alive lazily: once 80% of its lease has elapsed
//! the next read renews it first, and a read answered `403` renews (or logs
//! in again with `AppRole`) and retries once.

use crate::{
    secrets::{CredentialError, FetchFuture, SecretSource},
    vault, APP_USER_AGENT,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};

const VALUE_FIELD: &str = "value";

/// Credentials to log in again once the token can no longer be renewed.
pub struct AppRoleLogin {
    pub login_url: String,
    pub role_id: String,
    pub secret_id: SecretString,
}

impl std::fmt::Debug for AppRoleLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRoleLogin")
            .field("login_url", &self.login_url)
            .field("role_id", &self.role_id)
            .field("secret_id", &"***")
            .finish()
    }
}

struct Lease {
    token: SecretString,
    renew_at: Option<DateTime<Utc>>,
}

impl Lease {
    // A zero lease never expires (root and periodic tokens).
    fn new(token: SecretString, lease_duration: u64, now: DateTime<Utc>) -> Self {
        let renew_at = (lease_duration > 0).then(|| {
            i64::try_from(lease_duration / 5 * 4)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        Self { token, renew_at }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.renew_at.is_some_and(|renew_at| now >= renew_at)
    }
}

enum Read {
    Value(SecretString),
    Denied(String),
}

pub struct VaultKvSource {
    client: Client,
    vault_url: String,
    lease: RwLock<Lease>,
    approle: Option<AppRoleLogin>,
    mount: String,
    path: String,
}

impl VaultKvSource {
    /// `lease_duration` is the token lease in seconds as returned by the login.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        vault_url: &str,
        token: SecretString,
        lease_duration: u64,
        mount: &str,
        path: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            vault_url: vault_url.to_string(),
            lease: RwLock::new(Lease::new(token, lease_duration, Utc::now())),
            approle: None,
            mount: mount.trim_matches('/').to_string(),
            path: path.trim_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn with_approle(mut self, login: AppRoleLogin) -> Self {
        self.approle = Some(login);
        self
    }

    fn secret_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            format!("/v1/{}/data/{name}", self.mount)
        } else {
            format!("/v1/{}/data/{}/{name}", self.mount, self.path)
        }
    }

    async fn current_token(&self) -> SecretString {
        let (token, due) = {
            let lease = self.lease.read().await;
            (lease.token.clone(), lease.is_due(Utc::now()))
        };

        if due {
            match self.refresh(&token).await {
                Ok(token) => return token,
                Err(err) => warn!("Vault token renewal failed, using current token: {err}"),
            }
        }

        token
    }

    /// Renew `stale`, or log in again when renewal is refused. A token
    /// already replaced by a concurrent caller is returned as is.
    async fn refresh(&self, stale: &SecretString) -> Result<SecretString> {
        let mut lease = self.lease.write().await;
        if lease.token.expose_secret() != stale.expose_secret() {
            return Ok(lease.token.clone());
        }

        match vault::renew_self(&self.vault_url, stale.expose_secret()).await {
            Ok(lease_duration) => {
                debug!("Vault token renewed, lease {lease_duration}s");
                *lease = Lease::new(stale.clone(), lease_duration, Utc::now());
                return Ok(lease.token.clone());
            }
            Err(err) => debug!("Vault token renewal refused: {err}"),
        }

        let login = self
            .approle
            .as_ref()
            .ok_or_else(|| anyhow!("token cannot be renewed and no AppRole login is configured"))?;
        let (token, lease_duration) = vault::approle_login(
            &login.login_url,
            login.secret_id.expose_secret(),
            &login.role_id,
        )
        .await?;

        info!("Logged in to Vault again, lease {lease_duration}s");
        *lease = Lease::new(SecretString::from(token), lease_duration, Utc::now());
        Ok(lease.token.clone())
    }

    async fn read(&self, name: &str) -> Result<SecretString, CredentialError> {
        let token = self.current_token().await;

        let body = match self.read_once(name, &token).await? {
            Read::Value(value) => return Ok(value),
            Read::Denied(body) => body,
        };

        warn!("Vault denied reading {name}, refreshing token");
        let token = match self.refresh(&token).await {
            Ok(token) => token,
            Err(err) => {
                warn!("Vault token refresh failed: {err}");
                return Err(denied(name, &body));
            }
        };

        match self.read_once(name, &token).await? {
            Read::Value(value) => Ok(value),
            Read::Denied(body) => Err(denied(name, &body)),
        }
    }

    async fn read_once(&self, name: &str, token: &SecretString) -> Result<Read, CredentialError> {
        let url = vault::endpoint_url(&self.vault_url, &self.secret_path(name))
            .map_err(|err| CredentialError::fetch(name, err))?;

        let span = info_span!(
            "vault.kv.read",
            http.method = "GET",
            url = %url
        );
        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", token.expose_secret())
            .send()
            .instrument(span)
            .await
            .map_err(|err| CredentialError::fetch(name, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CredentialError::NotFound(name.to_string()));
        }

        if status == StatusCode::FORBIDDEN {
            return Ok(Read::Denied(response.text().await.unwrap_or_default()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::fetch(
                name,
                format!("vault kv read failed: {status} {body}"),
            ));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|err| CredentialError::malformed(name, err))?;

        json.get("data")
            .and_then(|data| data.get("data"))
            .and_then(|data| data.get(VALUE_FIELD))
            .and_then(Value::as_str)
            .map(|value| Read::Value(SecretString::from(value.to_string())))
            .ok_or_else(|| CredentialError::malformed(name, "value missing from vault response"))
    }
}

fn denied(name: &str, body: &str) -> CredentialError {
    CredentialError::fetch(
        name,
        format!("vault kv read failed: {} {body}", StatusCode::FORBIDDEN),
    )
}

impl SecretSource for VaultKvSource {
    fn fetch<'a>(&'a self, name: &'a str) -> FetchFuture<'a> {
        Box::pin(self.read(name))
    }
}

impl std::fmt::Debug for VaultKvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKvSource")
            .field("vault_url", &self.vault_url)
            .field("token", &"***")
            .field("approle", &self.approle)
            .field("mount", &self.mount)
            .field("path", &self.path)
            .finish()
    }
}
