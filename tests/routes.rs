//! Public routes and the trace metrics proxy.
#![allow(clippy::unwrap_used)]

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{body_json, header, TestApp};
use serde_json::json;
use wiremock::matchers::{body_json as body_json_matcher, header as header_matcher, method, path};
use wiremock::{Mock, ResponseTemplate};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn trace_metrics(cookie: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/trace_metrics")
        .header("cookie", cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = TestApp::new().await;

    let response = app.send(get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let x_app = header(&response, "x-app").unwrap();
    assert!(x_app.starts_with(&format!(
        "{}:{}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )));
    assert_eq!(body_json(response).await, json!({"status": "healthy"}));
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let app = TestApp::new().await;

    let response = app.send(get("/does/not/exist")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({
            "error": "Not Found",
            "message": "The requested URL was not found on the server.",
        })
    );
}

#[tokio::test]
async fn root_redirects_to_app_entry() {
    let app = TestApp::new().await;

    let response = app.send(get("/")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header(&response, "location"), Some("/brush.html"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let response = app.send(get("/api-docs/openapi.json")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/auth/callback"].is_object());
    assert!(doc["paths"]["/api/v1/trace_metrics"]["post"].is_object());
}

#[tokio::test]
async fn request_id_is_generated_and_propagated() {
    let app = TestApp::new().await;

    let response = app.send(get("/health")).await;
    let generated = header(&response, "x-request-id").unwrap();
    assert_eq!(generated.len(), 26);

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "caller-supplied")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(header(&response, "x-request-id"), Some("caller-supplied"));
}

#[tokio::test]
async fn trace_metrics_requires_authentication() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/trace_metrics")
                .body(Body::from(r#"{"trace_id":"t1"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn trace_metrics_requires_access_token() {
    let app = TestApp::new().await;
    let cookie = app.session_cookie("1234", None).await;

    let response = app.send(trace_metrics(&cookie, "not json")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "No access token found in session"})
    );
}

#[tokio::test]
async fn trace_metrics_rejects_empty_body() {
    let app = TestApp::new().await;
    let cookie = app.session_cookie("1234", Some("at")).await;

    for body in ["", "{}", "null", "not json"] {
        let response = app.send(trace_metrics(&cookie, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body:?}");
        assert_eq!(
            body_json(response).await,
            json!({"error": "Request body must be JSON"})
        );
    }
}

#[tokio::test]
async fn trace_metrics_relays_downstream_answer() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/trace_metrics"))
        .and(header_matcher("authorization", "Bearer at"))
        .and(body_json_matcher(json!({"trace_id": "t1"})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"metrics": [1, 2, 3]})))
        .expect(1)
        .mount(&app.provider)
        .await;
    let cookie = app.session_cookie("1234", Some("at")).await;

    let response = app
        .send(trace_metrics(&cookie, r#"{"trace_id":"t1"}"#))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await, json!({"metrics": [1, 2, 3]}));
}

#[tokio::test]
async fn trace_metrics_reports_downstream_failure() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/trace_metrics"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .expect(1)
        .mount(&app.provider)
        .await;
    let cookie = app.session_cookie("1234", Some("at")).await;

    let response = app
        .send(trace_metrics(&cookie, r#"{"trace_id":"t1"}"#))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await,
        json!({
            "error": "Failed to fetch from Brush API",
            "status_code": 503,
            "details": "backend unavailable",
        })
    );
}

#[tokio::test]
async fn trace_metrics_non_json_success_is_internal_error() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/trace_metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&app.provider)
        .await;
    let cookie = app.session_cookie("1234", Some("at")).await;

    let response = app
        .send(trace_metrics(&cookie, r#"{"trace_id":"t1"}"#))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "An internal error occurred"})
    );
}
