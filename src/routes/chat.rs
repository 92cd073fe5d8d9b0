// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat assistant routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::default_user_id;
use crate::error::{AppError, Result};
use crate::models::GlucoseWindow;
use crate::services::chat::insight_prompt;
use crate::services::language_model::Usage;
use crate::services::ChatReply;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/glucose-insights", post(glucose_insights))
        .route("/chat/health", get(chat_health))
}

#[derive(Deserialize)]
pub struct ChatRequest {
    message: String,
    #[serde(default)]
    context: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message must not be empty".to_string()));
    }

    let reply = state
        .chat
        .respond(&req.user_id, &req.message, &req.context, GlucoseWindow::default())
        .await;
    Ok(Json(reply))
}

fn default_analysis_type() -> String {
    "general".to_string()
}

#[derive(Deserialize)]
pub struct InsightsRequest {
    #[serde(default = "default_analysis_type")]
    analysis_type: String,
    #[serde(default)]
    time_range: GlucoseWindow,
    #[serde(default = "default_user_id")]
    user_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InsightsResponse {
    pub success: bool,
    pub insights: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Canned analysis of the user's recent glucose data.
async fn glucose_insights(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InsightsRequest>,
) -> Json<InsightsResponse> {
    let context = format!(
        "Please analyze my glucose data for the last {}",
        req.time_range
    );
    let reply = state
        .chat
        .respond(
            &req.user_id,
            insight_prompt(&req.analysis_type),
            &context,
            req.time_range,
        )
        .await;

    let insights = if reply.success {
        reply.response
    } else {
        "Unable to generate insights at this time.".to_string()
    };

    Json(InsightsResponse {
        success: reply.success,
        insights,
        model: reply.model,
        usage: reply.usage,
        error: reply.error,
    })
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChatHealthResponse {
    pub status: String,
    pub model_configured: bool,
}

async fn chat_health(State(state): State<Arc<AppState>>) -> Json<ChatHealthResponse> {
    let enabled = state.chat.is_enabled();
    Json(ChatHealthResponse {
        status: if enabled { "healthy" } else { "disabled" }.to_string(),
        model_configured: enabled,
    })
}
