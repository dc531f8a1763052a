use super::{
    cookies::{clear_session_cookie, session_cookie},
    state::AuthState,
};
use crate::{
    api::{error::ApiError, handlers::found},
    secrets::OAUTH_CLIENT_ID,
    session::SessionData,
};
use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, Method},
    response::{IntoResponse, Json, Response},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code issued by the provider.
    pub code: Option<String>,
    /// The signed state minted by `/auth/login`.
    pub state: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/login",
    responses(
        (status = 302, description = "Redirect to the provider consent page"),
        (status = 500, description = "Credentials unavailable")
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state))]
pub async fn login(auth_state: Extension<Arc<AuthState>>) -> Result<Response, ApiError> {
    let state = auth_state
        .csrf()
        .create(auth_state.config().state_ttl())
        .await?;
    let client_id = auth_state.secrets().get(OAUTH_CLIENT_ID).await?;

    let url = auth_state
        .provider()
        .authorization_url(client_id.expose_secret(), &state)
        .map_err(|err| ApiError::Internal(format!("invalid authorize URL: {err}")))?;

    Ok(found(url.as_str()))
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    responses(
        (status = 302, description = "Session established, redirect to the app"),
        (status = 400, description = "Missing code or subject"),
        (status = 403, description = "Invalid state token (CSRF)"),
        (status = 500, description = "Provider exchange failed")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn callback(
    auth_state: Extension<Arc<AuthState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    // State first: nothing reaches the provider without a valid one.
    let state = params
        .state
        .filter(|state| !state.is_empty())
        .ok_or(ApiError::InvalidState)?;
    auth_state.csrf().verify(&state).await?;

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(ApiError::Input("No authorization code received"))?;

    let tokens = auth_state
        .provider()
        .exchange_code(&code)
        .await
        .map_err(|err| ApiError::upstream("Failed to exchange code for token", err))?;

    let user = auth_state
        .provider()
        .userinfo(&tokens.access_token)
        .await
        .map_err(|err| ApiError::upstream("Failed to fetch user info", err))?;

    let subject = user
        .subject()
        .ok_or(ApiError::Input("User ID not found in userinfo response"))?
        .to_string();

    let data = SessionData {
        user_id: subject.clone(),
        gaia_id: subject.clone(),
        email: user.email,
        name: user.name,
        picture: user.picture,
        access_token: Some(tokens.access_token),
        refresh_token: tokens.refresh_token,
    };
    let token = auth_state
        .sessions()
        .create(data, auth_state.config().session_ttl())
        .await?;

    let cookie = session_cookie(auth_state.config(), &token)
        .map_err(|err| ApiError::Internal(format!("invalid session cookie: {err}")))?;

    info!("Session established for {subject}");

    Ok(([(SET_COOKIE, cookie)], found(auth_state.config().app_entry())).into_response())
}

#[utoipa::path(
    method(get, post),
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session cleared (POST)"),
        (status = 302, description = "Session cleared, redirect to / (GET)")
    ),
    tag = "auth"
)]
pub async fn logout(method: Method) -> Response {
    // Stateless sessions: clearing the cookie is all there is.
    let headers = [(SET_COOKIE, clear_session_cookie())];

    if method == Method::GET {
        (headers, found("/")).into_response()
    } else {
        (headers, Json(json!({"status": "logged_out"}))).into_response()
    }
}
