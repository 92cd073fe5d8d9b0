// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dexcom account connection routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::UserQuery;
use crate::error::{AppError, Result};
use crate::services::ConnectionStatus;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dexcom/connect", get(connect))
        .route("/dexcom/callback", get(callback))
        .route("/dexcom/status/{user_id}", get(status))
        .route("/dexcom/disconnect/{user_id}", post(disconnect))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectResponse {
    pub authorization_url: String,
    pub state: String,
}

/// Start authorization: issue a state and hand back the Dexcom login URL.
async fn connect(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> Result<Json<ConnectResponse>> {
    let oauth_state = state.oauth_states.issue(&params.user_id)?;
    let authorization_url = state.tokens.client().build_authorization_url(&oauth_state);

    tracing::info!(user_id = %params.user_id, "Starting Dexcom authorization");

    Ok(Json(ConnectResponse {
        authorization_url,
        state: oauth_state,
    }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CallbackResponse {
    pub status: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// OAuth callback: redeem the state, exchange the code, store the tokens.
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>> {
    // The state is consumed before anything else so it can never be replayed,
    // even when the rest of the callback fails.
    let user_id = params
        .state
        .as_deref()
        .and_then(|s| state.oauth_states.consume(s))
        .ok_or_else(|| {
            tracing::warn!("Dexcom callback with unknown, expired or reused state");
            AppError::InvalidState
        })?;

    if let Some(error) = params.error {
        tracing::warn!(user_id = %user_id, error = %error, "Dexcom denied authorization");
        return Err(AppError::UpstreamAuth {
            status: None,
            body: error,
        });
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let record = state.tokens.connect(&user_id, &code).await?;

    Ok(Json(CallbackResponse {
        status: "connected".to_string(),
        user_id,
        expires_at: record.expires_at,
    }))
}

/// Connection status. Read-only.
async fn status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<ConnectionStatus> {
    Json(state.tokens.status(&user_id).await)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DisconnectResponse {
    pub deleted: bool,
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<DisconnectResponse> {
    let deleted = state.tokens.disconnect(&user_id).await;
    Json(DisconnectResponse { deleted })
}
