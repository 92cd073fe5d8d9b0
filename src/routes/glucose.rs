// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glucose data routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::default_user_id;
use crate::error::{AppError, Result};
use crate::models::{GlucoseWindow, ResolvedReadings};
use crate::services::ExportSummary;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/glucose", get(get_readings))
        .route("/glucose/summary", get(summary))
}

#[derive(Deserialize)]
pub struct ReadingsParams {
    #[serde(default)]
    range: Option<String>,
    #[serde(default = "default_user_id")]
    user_id: String,
}

/// Readings for the requested window from the best available source.
///
/// Only an unknown `range` fails; every data-path failure falls through to
/// the next source.
async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<ResolvedReadings>> {
    let window = match params.range.as_deref() {
        None => GlucoseWindow::default(),
        Some(raw) => raw.parse::<GlucoseWindow>().map_err(AppError::BadRequest)?,
    };

    Ok(Json(state.resolver.resolve(&params.user_id, window).await))
}

/// Statistics over the whole cached export.
async fn summary(State(state): State<Arc<AppState>>) -> Json<ExportSummary> {
    Json(state.export.summary().await)
}
