//! Cookie and bearer authentication on protected routes.
#![allow(clippy::unwrap_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, TestApp, CLIENT_ID};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn user_request(headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/user");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn mock_tokeninfo(app: &TestApp, token: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("access_token", token))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&app.provider)
        .await;
}

#[tokio::test]
async fn no_credentials_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.send(user_request(&[])).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Not authenticated or invalid token"})
    );
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = TestApp::new().await;
    let cookie = app.session_cookie("1234", Some("at")).await;

    let response = app
        .send(user_request(&[("cookie", format!("theme=dark; {cookie}").as_str())]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "authenticated": true,
            "user_id": "1234",
            "gaia_id": "1234",
            "email": "1234@example.com",
            "name": "Test User",
            "picture": null,
            "auth_method": "session_cookie",
        })
    );
}

#[tokio::test]
async fn bearer_token_authenticates() {
    let app = TestApp::new().await;
    mock_tokeninfo(
        &app,
        "ya29.token",
        200,
        json!({"aud": CLIENT_ID, "sub": "5678", "email": "cli@example.com"}),
    )
    .await;

    let response = app
        .send(user_request(&[("authorization", "Bearer ya29.token")]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let user = body_json(response).await;
    assert_eq!(user["user_id"], "5678");
    assert_eq!(user["email"], "cli@example.com");
    assert_eq!(user["auth_method"], "bearer_token");
}

#[tokio::test]
async fn bearer_token_for_other_client_is_rejected() {
    let app = TestApp::new().await;
    mock_tokeninfo(
        &app,
        "foreign",
        200,
        json!({"aud": "someone-else.apps.example.com", "sub": "5678"}),
    )
    .await;

    let response = app
        .send(user_request(&[("authorization", "Bearer foreign")]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Invalid token audience"})
    );
}

#[tokio::test]
async fn bearer_token_without_subject_is_rejected() {
    let app = TestApp::new().await;
    mock_tokeninfo(&app, "anonymous", 200, json!({"aud": CLIENT_ID})).await;

    let response = app
        .send(user_request(&[("authorization", "Bearer anonymous")]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn introspection_failure_is_unauthorized() {
    let app = TestApp::new().await;
    mock_tokeninfo(
        &app,
        "expired",
        400,
        json!({"error_description": "Invalid Value"}),
    )
    .await;

    let response = app
        .send(user_request(&[("authorization", "Bearer expired")]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Not authenticated or invalid token"})
    );
}

#[tokio::test]
async fn valid_cookie_skips_introspection() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.provider)
        .await;
    let cookie = app.session_cookie("1234", None).await;

    let response = app
        .send(user_request(&[
            ("cookie", cookie.as_str()),
            ("authorization", "Bearer ya29.token"),
        ]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["auth_method"], "session_cookie");
}

#[tokio::test]
async fn tampered_cookie_falls_back_to_bearer() {
    let app = TestApp::new().await;
    mock_tokeninfo(&app, "ya29.token", 200, json!({"aud": CLIENT_ID, "sub": "5678"})).await;

    let response = app
        .send(user_request(&[
            ("cookie", "session_id=AAAAtampered"),
            ("authorization", "Bearer ya29.token"),
        ]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["auth_method"], "bearer_token");
}

#[tokio::test]
async fn tampered_cookie_alone_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .send(user_request(&[("cookie", "session_id=not-a-session")]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_session_key_is_internal_error() {
    let source = common::MemorySource::with_defaults();
    source.remove(tracegate::secrets::SESSION_ENCRYPTION_KEY);
    let app = TestApp::with_source(source).await;

    let response = app
        .send(user_request(&[("cookie", "session_id=anything")]))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Internal Server Error"})
    );
}
