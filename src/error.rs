// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Only `InvalidState`, `UpstreamAuth` and request validation errors ever
/// reach a client; the data path absorbs the rest in the tiered resolver.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Dexcom rejected an authorization-code or refresh-token exchange.
    #[error("Dexcom authorization failed (status {status:?}): {body}")]
    UpstreamAuth { status: Option<u16>, body: String },

    /// Dexcom rejected or failed a data request.
    #[error("Dexcom data request failed (status {status:?}): {body}")]
    UpstreamData { status: Option<u16>, body: String },

    /// The durable token store could not be reached.
    #[error("Token storage unavailable: {0}")]
    StorageUnavailable(String),

    /// OAuth callback state was unknown, expired or already used.
    #[error("Invalid or expired OAuth state")]
    InvalidState,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status reported by Dexcom, if the error came from a response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::UpstreamAuth { status, .. } | AppError::UpstreamData { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::UpstreamAuth { status, .. } => {
                tracing::warn!(upstream_status = ?status, error = %self, "Dexcom authorization error");
                (
                    StatusCode::BAD_GATEWAY,
                    "dexcom_auth_error",
                    status.map(|s| format!("Dexcom responded with status {}", s)),
                )
            }
            AppError::UpstreamData { status, .. } => {
                tracing::warn!(upstream_status = ?status, error = %self, "Dexcom data error");
                (StatusCode::BAD_GATEWAY, "dexcom_data_error", None)
            }
            AppError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", None)
            }
            AppError::LanguageModel(msg) => {
                tracing::error!(error = %msg, "Language model error");
                (StatusCode::BAD_GATEWAY, "language_model_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
