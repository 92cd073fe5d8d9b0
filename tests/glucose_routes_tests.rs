// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tiered glucose data tests.
//!
//! Every request gets readings: live Dexcom data when a usable token exists,
//! then the device export, then synthetic data. Only an unknown range fails.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use glucose_tracker::config::Config;
use glucose_tracker::models::TokenRecord;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{body_json, config_with_dexcom, create_app_with, create_test_app, write_export};

const EXPORT: &str = r#"[
    {"Index": 1, "Event Type": "EGV", "Timestamp (YYYY-MM-DDThh:mm:ss)": "2024-03-01T06:00:00", "Glucose Value (mg/dL)": 100},
    {"Index": 2, "Event Type": "EGV", "Timestamp (YYYY-MM-DDThh:mm:ss)": "2024-03-01T09:00:00", "Glucose Value (mg/dL)": "130"},
    {"Index": 3, "Event Type": "EGV", "Timestamp (YYYY-MM-DDThh:mm:ss)": "2024-03-01T12:00:00", "Glucose Value (mg/dL)": 160}
]"#;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn timestamps(body: &serde_json::Value) -> Vec<DateTime<Utc>> {
    body["readings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["timestamp"].as_str().unwrap().parse().unwrap())
        .collect()
}

fn config_with_export(base_url: &str) -> Config {
    let mut config = config_with_dexcom(base_url);
    config.export_data_path = write_export(EXPORT);
    config
}

async fn mount_egvs(server: &MockServer, access_token: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v2/users/self/egvs"))
        .and(header("Authorization", format!("Bearer {}", access_token).as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn egvs_body() -> serde_json::Value {
    serde_json::json!({
        "unit": "mg/dL",
        "egvs": [
            { "systemTime": "2024-03-01T10:05:00", "value": 125, "trend": "flat", "trendRate": 0.2 },
            { "systemTime": "2024-03-01T10:00:00", "value": 118, "trend": "fortyFiveUp", "trendRate": 1.1 },
            { "systemTime": "2024-03-01T10:10:00", "value": null, "trend": "none" }
        ]
    })
}

#[tokio::test]
async fn test_unknown_range_is_rejected() {
    let (app, _) = create_test_app();

    let response = app.oneshot(get("/glucose?range=48h")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_no_token_no_export_gives_synthetic_day() {
    let (app, _) = create_test_app();

    let response = app.oneshot(get("/glucose")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["source"], "synthetic");
    assert_eq!(body["window"], "24h");

    let times = timestamps(&body);
    assert_eq!(times.len(), 24);
    assert!(times.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_synthetic_short_window() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(get("/glucose?range=3h&user_id=someone"))
        .await
        .unwrap();
    let body = body_json(response).await;

    assert_eq!(body["source"], "synthetic");
    assert_eq!(body["window"], "3h");
    assert_eq!(body["readings"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn test_export_used_without_token() {
    let mut config = Config::test_default();
    config.export_data_path = write_export(EXPORT);
    let (app, _) = create_app_with(config);

    let response = app.oneshot(get("/glucose?range=6h")).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["source"], "cached_export");
    let values: Vec<f64> = body["readings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["value_mgdl"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![100.0, 130.0, 160.0]);
}

#[tokio::test]
async fn test_live_data_with_valid_token() {
    let server = MockServer::start().await;
    mount_egvs(
        &server,
        "live-token",
        ResponseTemplate::new(200).set_body_json(egvs_body()),
    )
    .await;
    let (app, state) = create_app_with(config_with_export(&server.uri()));

    state
        .tokens
        .store()
        .put(
            "erin",
            TokenRecord::issued("erin", "live-token", "refresh", 3600, Utc::now()),
        )
        .await;

    let response = app
        .oneshot(get("/glucose?range=3h&user_id=erin"))
        .await
        .unwrap();
    let body = body_json(response).await;

    assert_eq!(body["source"], "live");
    let readings = body["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0]["value_mgdl"], 118.0);
    assert_eq!(readings[0]["trend"], "rising");
    assert_eq!(readings[1]["trend"], "stable");
    assert!(readings.iter().all(|r| r["source"] == "live"));
}

#[tokio::test]
async fn test_live_empty_result_is_not_a_fallback() {
    let server = MockServer::start().await;
    mount_egvs(
        &server,
        "live-token",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "egvs": [] })),
    )
    .await;
    let (app, state) = create_app_with(config_with_export(&server.uri()));

    state
        .tokens
        .store()
        .put(
            "frank",
            TokenRecord::issued("frank", "live-token", "refresh", 3600, Utc::now()),
        )
        .await;

    let body = body_json(app.oneshot(get("/glucose?user_id=frank")).await.unwrap()).await;
    assert_eq!(body["source"], "live");
    assert!(body["readings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_live_failure_falls_back_to_export() {
    let server = MockServer::start().await;
    mount_egvs(
        &server,
        "live-token",
        ResponseTemplate::new(500).set_body_string("boom"),
    )
    .await;
    let (app, state) = create_app_with(config_with_export(&server.uri()));

    state
        .tokens
        .store()
        .put(
            "gina",
            TokenRecord::issued("gina", "live-token", "refresh", 3600, Utc::now()),
        )
        .await;

    let response = app.oneshot(get("/glucose?user_id=gina")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["source"], "cached_export");
}

#[tokio::test]
async fn test_live_failure_without_export_gives_synthetic() {
    let server = MockServer::start().await;
    mount_egvs(
        &server,
        "live-token",
        ResponseTemplate::new(503).set_body_string("unavailable"),
    )
    .await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    state
        .tokens
        .store()
        .put(
            "gus",
            TokenRecord::issued("gus", "live-token", "refresh", 3600, Utc::now()),
        )
        .await;

    let response = app
        .oneshot(get("/glucose?range=12h&user_id=gus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["source"], "synthetic");
    assert!(!body["readings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_egvs(
        &server,
        "fresh-token",
        ResponseTemplate::new(200).set_body_json(egvs_body()),
    )
    .await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    state
        .tokens
        .store()
        .put(
            "hank",
            TokenRecord::issued("hank", "stale-token", "old-refresh", -60, Utc::now()),
        )
        .await;

    let body = body_json(app.oneshot(get("/glucose?user_id=hank")).await.unwrap()).await;
    assert_eq!(body["source"], "live");

    let stored = state.tokens.store().get("hank").await.unwrap();
    assert_eq!(stored.access_token, "fresh-token");
    assert_eq!(stored.refresh_token, "old-refresh");
    assert!(stored.is_valid_at(Utc::now()));
}

#[tokio::test]
async fn test_failed_refresh_leaves_record_and_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    let expired = TokenRecord::issued("ivy", "stale-token", "revoked", -60, Utc::now());
    state.tokens.store().put("ivy", expired.clone()).await;

    let body = body_json(app.oneshot(get("/glucose?user_id=ivy")).await.unwrap()).await;
    assert_eq!(body["source"], "synthetic");

    let stored = state.tokens.store().get("ivy").await.unwrap();
    assert_eq!(stored.access_token, expired.access_token);
    assert_eq!(stored.expires_at, expired.expires_at);
}

#[tokio::test]
async fn test_out_of_range_expires_in_on_refresh_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A2",
            "expires_in": i64::MAX
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (app, state) = create_app_with(config_with_dexcom(&server.uri()));

    let expired = TokenRecord::issued("uma", "stale-token", "R1", -60, Utc::now());
    state.tokens.store().put("uma", expired.clone()).await;

    let response = app.oneshot(get("/glucose?user_id=uma")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["source"], "synthetic");
    assert_eq!(body["readings"].as_array().unwrap().len(), 24);

    let stored = state.tokens.store().get("uma").await.unwrap();
    assert_eq!(stored.access_token, expired.access_token);
    assert_eq!(stored.expires_at, expired.expires_at);
}

#[tokio::test]
async fn test_summary_reports_export_statistics() {
    let mut config = Config::test_default();
    config.export_data_path = write_export(EXPORT);
    let (app, _) = create_app_with(config);

    let response = app.oneshot(get("/glucose/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total_readings"], 3);
    assert_eq!(body["avg_glucose"], 130.0);
    assert_eq!(body["min_glucose"], 100.0);
    assert_eq!(body["max_glucose"], 160.0);
}

#[tokio::test]
async fn test_summary_without_export() {
    let (app, _) = create_test_app();

    let body = body_json(app.oneshot(get("/glucose/summary")).await.unwrap()).await;
    assert_eq!(body["total_readings"], 0);
    assert!(body["date_range"].is_null());
}
