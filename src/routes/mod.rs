// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod chat;
pub mod dexcom;
pub mod glucose;

use crate::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User assumed when a request does not name one.
pub const DEFAULT_USER_ID: &str = "default_user";

pub(crate) fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// Optional `user_id` query parameter.
#[derive(Deserialize)]
pub struct UserQuery {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
    pub token_storage: String,
}

/// Health check response
async fn health_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    let token_storage = if state.tokens.store().is_degraded() {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
        token_storage: token_storage.to_string(),
    })
}

/// Whether a browser origin may call the API.
fn origin_allowed(origin: &HeaderValue, frontend_url: &str) -> bool {
    let origin_str = origin.to_str().unwrap_or("");
    origin_str == frontend_url
        || origin_str.starts_with("http://localhost")
        || origin_str.starts_with("http://127.0.0.1")
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts: &axum::http::request::Parts| {
                origin_allowed(origin, &frontend_url)
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_check))
        .merge(dexcom::routes())
        .merge(glucose::routes())
        .merge(chat::routes())
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
