//! Route handlers.

pub mod auth;
pub mod health;
pub mod trace_metrics;
pub mod user;

use crate::api::error::ApiError;
use auth::AuthState;
use axum::{
    extract::Extension,
    http::{header::LOCATION, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// `302 Found` to `location`, what browsers and the provider's consent
/// page expect from a sign-in flow.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::try_from(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(err) => {
            ApiError::Internal(format!("invalid redirect location {location}: {err}")).into_response()
        }
    }
}

pub async fn root(auth_state: Extension<Arc<AuthState>>) -> Response {
    found(auth_state.config().app_entry())
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    debug!("No route for {uri}");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested URL was not found on the server.",
        })),
    )
}
