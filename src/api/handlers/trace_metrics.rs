use super::auth::{AuthContext, AuthState};
use crate::{api::error::ApiError, upstream::UpstreamError};
use axum::{
    body::Bytes,
    extract::Extension,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Parse a forwardable body. Empty or "falsy" JSON (`null`, `{}`, `[]`,
/// `""`, `0`, `false`) is refused like a body that is not JSON at all.
fn parse_body(body: &[u8]) -> Option<Value> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let empty = match &value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    };
    (!empty).then_some(value)
}

#[utoipa::path(
    post,
    path = "/api/v1/trace_metrics",
    request_body(content = Object, description = "Query forwarded as is", content_type = "application/json"),
    responses(
        (status = 200, description = "Downstream answer relayed"),
        (status = 400, description = "Request body must be JSON"),
        (status = 401, description = "Not authenticated or no access token")
    ),
    tag = "api"
)]
#[instrument(skip_all)]
pub async fn trace_metrics(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(context): Extension<AuthContext>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let access_token = context
        .access_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingAccessToken)?;

    let body = parse_body(&body).ok_or(ApiError::Input("Request body must be JSON"))?;

    match auth_state
        .downstream()
        .trace_metrics(access_token, &body)
        .await
    {
        Ok(response) => Ok((response.status, Json(response.body)).into_response()),
        Err(UpstreamError::Status { status, body }) => Err(ApiError::Downstream {
            status,
            details: body,
        }),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}
