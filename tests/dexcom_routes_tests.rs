// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dexcom connection flow tests.
//!
//! These tests verify that:
//! 1. A state issued by /dexcom/connect can be redeemed exactly once
//! 2. Unknown or reused states are rejected with 400
//! 3. Token endpoint failures surface as 502
//! 4. Status is read-only and disconnect is idempotent

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{body_json, config_with_dexcom, create_app_with, create_test_app};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn mount_code_exchange(server: &MockServer, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 7200,
            "token_type": "Bearer"
        }))
    } else {
        ResponseTemplate::new(status).set_body_string("invalid_grant")
    };

    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn start_flow(app: &axum::Router, user_id: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(get(&format!("/dexcom/connect?user_id={}", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_connect_returns_authorization_url_with_state() {
    let (app, state) = create_test_app();

    let body = start_flow(&app, "alice").await;
    let oauth_state = body["state"].as_str().unwrap();
    let url = body["authorization_url"].as_str().unwrap();

    assert!(url.starts_with("https://sandbox-api.dexcom.com/v2/oauth2/login?"));
    assert!(url.contains("client_id=test_client_id"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("scope=offline_access"));
    assert!(url.contains(&format!("state={}", oauth_state)));
    assert_eq!(state.oauth_states.len(), 1);
}

#[tokio::test]
async fn test_connect_defaults_user() {
    let (app, state) = create_test_app();

    let response = app.oneshot(get("/dexcom/connect")).await.unwrap();
    let body = body_json(response).await;
    let oauth_state = body["state"].as_str().unwrap();

    assert_eq!(
        state.oauth_states.consume(oauth_state).as_deref(),
        Some("default_user")
    );
}

#[tokio::test]
async fn test_callback_connects_and_state_is_single_use() {
    let server = MockServer::start().await;
    mount_code_exchange(&server, 200).await;
    let (app, _) = create_app_with(config_with_dexcom(&server.uri()));

    let body = start_flow(&app, "alice").await;
    let callback = format!(
        "/dexcom/callback?code=auth-code&state={}",
        body["state"].as_str().unwrap()
    );

    let response = app.clone().oneshot(get(&callback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "connected");
    assert_eq!(body["user_id"], "alice");

    let response = app
        .clone()
        .oneshot(get("/dexcom/status/alice"))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["connected"], true);
    assert_eq!(status["token_valid"], true);
    assert!(status["expires_at"].is_string());

    // Replaying the same state must fail even though it worked once
    let response = app.oneshot(get(&callback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_state");
}

#[tokio::test]
async fn test_callback_unknown_state() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(get("/dexcom/callback?code=abc&state=never-issued"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_state");

    let response = app
        .oneshot(get("/dexcom/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_upstream_rejection_is_502_and_state_burned() {
    let server = MockServer::start().await;
    mount_code_exchange(&server, 400).await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    let body = start_flow(&app, "bob").await;
    let callback = format!(
        "/dexcom/callback?code=bad-code&state={}",
        body["state"].as_str().unwrap()
    );

    let response = app.clone().oneshot(get(&callback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "dexcom_auth_error");
    assert!(!state.tokens.status("bob").await.connected);

    let response = app.oneshot(get(&callback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_out_of_range_expires_in_is_502() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": i64::MAX
        })))
        .mount(&server)
        .await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    let body = start_flow(&app, "olga").await;
    let callback = format!(
        "/dexcom/callback?code=auth-code&state={}",
        body["state"].as_str().unwrap()
    );

    let response = app.oneshot(get(&callback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "dexcom_auth_error");
    assert!(!state.tokens.status("olga").await.connected);
}

#[tokio::test]
async fn test_callback_with_provider_error() {
    let (app, _) = create_test_app();

    let body = start_flow(&app, "carol").await;
    let callback = format!(
        "/dexcom/callback?error=access_denied&state={}",
        body["state"].as_str().unwrap()
    );

    let response = app.oneshot(get(&callback)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_status_unknown_user() {
    let (app, _) = create_test_app();

    let response = app.oneshot(get("/dexcom/status/nobody")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["token_valid"], false);
    assert!(body["expires_at"].is_null());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let server = MockServer::start().await;
    mount_code_exchange(&server, 200).await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    state.tokens.connect("dave", "auth-code").await.unwrap();

    let response = app
        .clone()
        .oneshot(post("/dexcom/disconnect/dave"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["deleted"], true);

    let response = app
        .clone()
        .oneshot(post("/dexcom/disconnect/dave"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["deleted"], false);

    let response = app.oneshot(get("/dexcom/status/dave")).await.unwrap();
    assert_eq!(body_json(response).await["connected"], false);
}
