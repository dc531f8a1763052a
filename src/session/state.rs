//! Signed, expiring OAuth `state` values.
//!
//! The state is an HS256 JWT carrying only `exp`, signed with the
//! `oauth-jwt-secret` secret. It is tamper-evident but readable by anyone.
//! Nothing is stored server-side, so a captured state can be replayed until
//! it expires.

use crate::secrets::{CredentialError, SecretStore, OAUTH_JWT_SECRET};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateClaims {
    exp: i64,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("state rejected")]
    Rejected,
    #[error("failed to sign state: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("state ttl {0} is out of range")]
    Ttl(Duration),
}

#[derive(Debug)]
pub struct CsrfStateCodec {
    secrets: Arc<SecretStore>,
}

impl CsrfStateCodec {
    #[must_use]
    pub fn new(secrets: Arc<SecretStore>) -> Self {
        Self { secrets }
    }

    /// # Errors
    /// Returns an error if the signing secret is unavailable or signing fails.
    pub async fn create(&self, ttl: Duration) -> Result<String, StateError> {
        self.create_at(ttl, Utc::now()).await
    }

    /// # Errors
    /// Returns an error if the signing secret is unavailable or signing fails.
    pub async fn create_at(&self, ttl: Duration, now: DateTime<Utc>) -> Result<String, StateError> {
        let secret = self.secrets.get(OAUTH_JWT_SECRET).await?;
        let expires_at = now.checked_add_signed(ttl).ok_or(StateError::Ttl(ttl))?;
        let claims = StateClaims {
            exp: expires_at.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
        )
        .map_err(StateError::Sign)
    }

    /// Check signature and expiry. Both failures collapse into
    /// [`StateError::Rejected`].
    ///
    /// # Errors
    /// Returns `Rejected` for a bad or expired state, `Credential` if the
    /// signing secret is unavailable.
    pub async fn verify(&self, state: &str) -> Result<(), StateError> {
        self.verify_at(state, Utc::now()).await
    }

    /// # Errors
    /// Returns `Rejected` for a bad or expired state, `Credential` if the
    /// signing secret is unavailable.
    pub async fn verify_at(&self, state: &str, now: DateTime<Utc>) -> Result<(), StateError> {
        let secret = self.secrets.get(OAUTH_JWT_SECRET).await?;

        // Expiry is checked below against `now` with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let claims = decode::<StateClaims>(
            state,
            &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|err| {
            warn!("OAuth state rejected: {err}");
            StateError::Rejected
        })?
        .claims;

        if claims.exp <= now.timestamp() {
            warn!("OAuth state rejected: expired");
            return Err(StateError::Rejected);
        }

        Ok(())
    }
}
