use super::auth::{AuthContext, AuthMethod};
use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UserResponse {
    authenticated: bool,
    user_id: String,
    gaia_id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    auth_method: AuthMethod,
}

impl From<AuthContext> for UserResponse {
    fn from(context: AuthContext) -> Self {
        Self {
            authenticated: true,
            user_id: context.user_id,
            gaia_id: context.gaia_id,
            email: context.email,
            name: context.name,
            picture: context.picture,
            auth_method: context.auth_method,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "Identity of the caller", body = UserResponse),
        (status = 401, description = "Not authenticated or invalid token")
    ),
    tag = "api"
)]
pub async fn user(Extension(context): Extension<AuthContext>) -> Json<UserResponse> {
    Json(context.into())
}
