use super::handlers::{
    auth::{self, AuthMethod},
    health::{self, Health},
    trace_metrics,
    user::{self, UserResponse},
};
use axum::response::Json;
use utoipa::OpenApi;

/// `OpenAPI` document for the HTTP surface. Info is taken from Cargo metadata.
/// `/` and the 404 fallback are not documented.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::oauth::login,
        auth::oauth::callback,
        auth::oauth::logout,
        user::user,
        trace_metrics::trace_metrics,
    ),
    components(schemas(Health, UserResponse, AuthMethod)),
    tags(
        (name = "auth", description = "OAuth sign-in and sign-out"),
        (name = "api", description = "Authenticated endpoints"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/auth/login",
            "/auth/callback",
            "/auth/logout",
            "/api/user",
            "/api/v1/trace_metrics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
    }
}
