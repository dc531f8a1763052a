//! Encrypted, self-contained session tokens.
//!
//! Token layout before encoding: `version (1 byte) || nonce (12 bytes) ||
//! ciphertext`, sealed with `ChaCha20-Poly1305` under the
//! `session-encryption-key` secret, the version byte bound as AAD. The whole
//! thing is base64url encoded without padding so it fits in a cookie.

use crate::secrets::{CredentialError, SecretStore, SESSION_ENCRYPTION_KEY};
use base64ct::{Base64, Base64Url, Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, warn};

const TOKEN_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Identity and provider tokens carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    pub gaia_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Session payload as stored inside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub data: SessionData,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to seal session token")]
    Seal,
    #[error("session ttl {0} is out of range")]
    Ttl(Duration),
}

/// Reasons a token is rejected; only ever logged, callers see `None`.
#[derive(Debug, Error)]
enum OpenError {
    #[error("invalid base64url encoding")]
    Encoding,
    #[error("token too short")]
    Length,
    #[error("unsupported token version {0}")]
    Version(u8),
    #[error("decryption failed")]
    Decrypt,
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub struct SessionCodec {
    secrets: Arc<SecretStore>,
    cipher: OnceCell<ChaCha20Poly1305>,
}

impl SessionCodec {
    #[must_use]
    pub fn new(secrets: Arc<SecretStore>) -> Self {
        Self {
            secrets,
            cipher: OnceCell::new(),
        }
    }

    /// Resolve the cipher once per process. A failed resolution is not
    /// memoized, the next call tries again.
    async fn cipher(&self) -> Result<&ChaCha20Poly1305, CredentialError> {
        self.cipher
            .get_or_try_init(|| async {
                let secret = self.secrets.get(SESSION_ENCRYPTION_KEY).await?;
                let key = decode_key(secret.expose_secret())?;
                Ok::<_, CredentialError>(ChaCha20Poly1305::new(Key::from_slice(&key)))
            })
            .await
    }

    /// Issue a token for `data` valid for `ttl` from now.
    ///
    /// # Errors
    /// Returns an error if the encryption key cannot be resolved or sealing fails.
    pub async fn create(&self, data: SessionData, ttl: Duration) -> Result<String, SessionError> {
        self.create_at(data, ttl, Utc::now()).await
    }

    /// # Errors
    /// Returns an error if the encryption key cannot be resolved, the expiry
    /// does not fit a timestamp, or sealing fails.
    pub async fn create_at(
        &self,
        data: SessionData,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let cipher = self.cipher().await?;

        // Whole seconds, the payload stores unix timestamps.
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(SessionError::Ttl(ttl))?;
        let claims = SessionClaims {
            data,
            issued_at,
            expires_at,
        };

        seal(cipher, &claims)
    }

    /// Decrypt and validate a token. `Ok(None)` covers every form of invalid
    /// token, including expired ones.
    ///
    /// # Errors
    /// Returns an error only if the encryption key cannot be resolved.
    pub async fn verify(&self, token: &str) -> Result<Option<SessionClaims>, CredentialError> {
        self.verify_at(token, Utc::now()).await
    }

    /// # Errors
    /// Returns an error only if the encryption key cannot be resolved.
    pub async fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionClaims>, CredentialError> {
        let cipher = self.cipher().await?;

        match open(cipher, token) {
            Ok(claims) if claims.expires_at <= now => {
                warn!("Session verification failed: token expired");
                Ok(None)
            }
            Ok(claims) => Ok(Some(claims)),
            Err(err) => {
                warn!("Session verification failed: {err}");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("key_resolved", &self.cipher.initialized())
            .finish()
    }
}

/// Accepts the 32-byte key as url-safe base64 (padded or not) or standard base64.
fn decode_key(encoded: &str) -> Result<[u8; KEY_LEN], CredentialError> {
    let encoded = encoded.trim();
    let bytes = Base64Url::decode_vec(encoded)
        .or_else(|_| Base64UrlUnpadded::decode_vec(encoded))
        .or_else(|_| Base64::decode_vec(encoded))
        .map_err(|_| CredentialError::malformed(SESSION_ENCRYPTION_KEY, "key is not valid base64"))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        error!("session encryption key has {} bytes", bytes.len());
        CredentialError::malformed(
            SESSION_ENCRYPTION_KEY,
            format!("key must be {KEY_LEN} bytes"),
        )
    })
}

#[allow(deprecated)]
fn seal(cipher: &ChaCha20Poly1305, claims: &SessionClaims) -> Result<String, SessionError> {
    let plaintext = serde_json::to_vec(claims)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &plaintext,
                aad: &[TOKEN_VERSION],
            },
        )
        .map_err(|_| SessionError::Seal)?;

    let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    raw.push(TOKEN_VERSION);
    raw.extend_from_slice(&nonce_bytes);
    raw.extend_from_slice(&ciphertext);

    Ok(Base64UrlUnpadded::encode_string(&raw))
}

#[allow(deprecated)]
fn open(cipher: &ChaCha20Poly1305, token: &str) -> Result<SessionClaims, OpenError> {
    let raw = Base64UrlUnpadded::decode_vec(token.trim()).map_err(|_| OpenError::Encoding)?;

    let (version, rest) = raw.split_first().ok_or(OpenError::Length)?;
    if *version != TOKEN_VERSION {
        return Err(OpenError::Version(*version));
    }
    if rest.len() <= NONCE_LEN {
        return Err(OpenError::Length);
    }

    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: &[TOKEN_VERSION],
            },
        )
        .map_err(|_| OpenError::Decrypt)?;

    Ok(serde_json::from_slice(&plaintext)?)
}
