//! Request authentication for protected routes.
//!
//! The session cookie is tried first. Only when it is absent or does not
//! verify is a bearer token introspected with the provider, so a browser
//! with a valid session never costs a provider round trip.

use super::{
    cookies::{extract_bearer_token, extract_session_token},
    state::AuthState,
};
use crate::{
    api::error::ApiError,
    secrets::OAUTH_CLIENT_ID,
    session::SessionData,
    upstream::UpstreamError,
};
use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    SessionCookie,
    BearerToken,
}

/// Identity resolved for the current request. Lives in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub gaia_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub access_token: Option<String>,
    pub auth_method: AuthMethod,
}

impl AuthContext {
    fn from_session(data: SessionData) -> Self {
        Self {
            user_id: data.user_id,
            gaia_id: data.gaia_id,
            email: data.email,
            name: data.name,
            picture: data.picture,
            access_token: data.access_token,
            auth_method: AuthMethod::SessionCookie,
        }
    }
}

/// Resolve the caller's identity from `headers`.
///
/// # Errors
/// `Authentication` when neither path yields an identity, `AudienceMismatch`
/// for a bearer token minted for another client, `Credential` when a secret
/// needed to decide is unavailable.
#[instrument(skip_all)]
pub async fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    if let Some(token) = extract_session_token(headers) {
        if let Some(claims) = state.sessions().verify(&token).await? {
            return Ok(AuthContext::from_session(claims.data));
        }
        debug!("Session cookie did not verify");
    }

    if let Some(token) = extract_bearer_token(headers) {
        return authenticate_bearer(state, token).await;
    }

    Err(ApiError::Authentication)
}

async fn authenticate_bearer(state: &AuthState, token: String) -> Result<AuthContext, ApiError> {
    let info = match state.provider().tokeninfo(&token).await {
        Ok(info) => info,
        Err(UpstreamError::Credential(err)) => return Err(err.into()),
        Err(err) => {
            warn!("Bearer token validation failed: {err}");
            return Err(ApiError::Authentication);
        }
    };

    let client_id = state.secrets().get(OAUTH_CLIENT_ID).await?;
    if info.aud.as_deref() != Some(client_id.expose_secret()) {
        warn!(
            "Token audience mismatch, got {}",
            info.aud.as_deref().unwrap_or("none")
        );
        return Err(ApiError::AudienceMismatch);
    }

    let Some(subject) = info.sub.filter(|sub| !sub.is_empty()) else {
        warn!("Bearer token introspection returned no subject");
        return Err(ApiError::Authentication);
    };

    Ok(AuthContext {
        user_id: subject.clone(),
        gaia_id: subject,
        email: info.email,
        name: info.name,
        picture: info.picture,
        access_token: Some(token),
        auth_method: AuthMethod::BearerToken,
    })
}

/// Middleware for protected routes: inserts [`AuthContext`] or answers 401.
///
/// # Errors
/// Propagates the [`authenticate`] failure as the response.
pub async fn require_auth(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, request.headers()).await?;
    debug!(
        "Authenticated {} via {:?}",
        context.user_id, context.auth_method
    );
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_method_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AuthMethod::SessionCookie).ok().as_deref(),
            Some("\"session_cookie\"")
        );
        assert_eq!(
            serde_json::to_string(&AuthMethod::BearerToken).ok().as_deref(),
            Some("\"bearer_token\"")
        );
    }

    #[test]
    fn session_context_keeps_tokens() {
        let context = AuthContext::from_session(SessionData {
            user_id: "42".to_string(),
            gaia_id: "42".to_string(),
            email: Some("user@example.com".to_string()),
            name: None,
            picture: None,
            access_token: Some("at".to_string()),
            refresh_token: Some("rt".to_string()),
        });
        assert_eq!(context.auth_method, AuthMethod::SessionCookie);
        assert_eq!(context.access_token.as_deref(), Some("at"));
    }
}
