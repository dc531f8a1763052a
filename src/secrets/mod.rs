//! Named secret retrieval with a process-wide, invalidation-aware cache.
//!
//! Every component that needs credential material goes through one
//! [`SecretStore`], built at startup and shared behind an `Arc`. Entries are
//! immutable once fetched; invalidation evicts them so the next `get` reads
//! the latest version from the backing [`SecretSource`].
//!
//! An invalidation racing an in-flight fetch may let that fetch reinsert the
//! value it read before the eviction. The window is one round trip to the
//! secret service.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

pub const OAUTH_CLIENT_ID: &str = "oauth-client-id";
pub const OAUTH_CLIENT_SECRET: &str = "oauth-client-secret";
pub const OAUTH_JWT_SECRET: &str = "oauth-jwt-secret";
pub const SESSION_ENCRYPTION_KEY: &str = "session-encryption-key";

#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("secret '{0}' not found")]
    NotFound(String),
    #[error("failed to retrieve secret '{name}': {reason}")]
    Fetch { name: String, reason: String },
    #[error("secret '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },
}

impl CredentialError {
    pub fn fetch(name: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(name: &str, reason: impl ToString) -> Self {
        Self::Malformed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<SecretString, CredentialError>> + Send + 'a>>;

/// Backend holding the latest version of each named secret.
pub trait SecretSource: Send + Sync {
    fn fetch<'a>(&'a self, name: &'a str) -> FetchFuture<'a>;
}

#[derive(Clone)]
pub struct Secret {
    pub name: String,
    pub value: SecretString,
    pub fetched_at: DateTime<Utc>,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("value", &"***")
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

pub struct SecretStore {
    source: Arc<dyn SecretSource>,
    cache: RwLock<HashMap<String, Arc<Secret>>>,
}

impl SecretStore {
    #[must_use]
    pub fn new(source: Arc<dyn SecretSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached secret, fetching it from the source on a miss.
    ///
    /// # Errors
    /// Returns `CredentialError` if the secret is missing upstream or the fetch fails.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> Result<SecretString, CredentialError> {
        Ok(self.get_entry(name).await?.value.clone())
    }

    /// Same as [`SecretStore::get`] but keeps the fetch metadata.
    ///
    /// # Errors
    /// Returns `CredentialError` if the secret is missing upstream or the fetch fails.
    pub async fn get_entry(&self, name: &str) -> Result<Arc<Secret>, CredentialError> {
        if let Some(secret) = self.cache.read().await.get(name) {
            return Ok(Arc::clone(secret));
        }

        // The lock is not held across the fetch, concurrent misses may both fetch.
        let value = self.source.fetch(name).await.map_err(|err| {
            error!("Critical: failed to retrieve secret '{name}': {err}");
            err
        })?;

        let secret = Arc::new(Secret {
            name: name.to_string(),
            value,
            fetched_at: Utc::now(),
        });

        self.cache
            .write()
            .await
            .insert(name.to_string(), Arc::clone(&secret));

        debug!("cached secret '{name}'");

        Ok(secret)
    }

    /// Evict one entry, no-op when it is not cached.
    pub async fn invalidate(&self, name: &str) {
        if self.cache.write().await.remove(name).is_some() {
            info!("Cache cleared for secret: {name}");
        }
    }

    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
        info!("Cleared all cached secrets");
    }

    pub async fn is_cached(&self, name: &str) -> bool {
        self.cache.read().await.contains_key(name)
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore").finish_non_exhaustive()
    }
}
