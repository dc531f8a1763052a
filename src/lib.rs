//! # Tracegate (OAuth front-end for the trace viewer)
//!
//! `tracegate` signs users in with an external OAuth provider and proxies
//! their trace-metrics queries to a downstream API on their behalf.
//!
//! ## Sessions
//!
//! Sessions are stateless: the encrypted `session_id` cookie IS the session.
//! Tokens are `ChaCha20-Poly1305` sealed JSON with an embedded expiry; any
//! token that fails to open, parse, or is past its expiry is treated as absent.
//!
//! ## Authentication
//!
//! Protected routes accept either the session cookie or an
//! `Authorization: Bearer` provider access token. The cookie wins when both
//! are present. Bearer tokens are introspected with the provider and must
//! carry this service's client id as audience.
//!
//! ## Secrets
//!
//! OAuth client credentials, the state signing secret, and the session key
//! are read from Vault KV v2 and cached in-process. A `401` from the
//! provider evicts the cached client credentials and the call is retried
//! once, so credential rotation needs no restart.

pub mod api;
pub mod cli;
pub mod secrets;
pub mod session;
pub mod upstream;
pub mod vault;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
