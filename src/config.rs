// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Dexcom credentials are externally supplied; the only environment switch is
//! which base endpoint (sandbox or production) the client talks to.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Dexcom sandbox API endpoint (no real patient data).
pub const DEXCOM_SANDBOX_URL: &str = "https://sandbox-api.dexcom.com";
/// Dexcom production API endpoint.
pub const DEXCOM_PRODUCTION_URL: &str = "https://api.dexcom.com";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Dexcom OAuth ---
    /// Dexcom OAuth client ID
    pub dexcom_client_id: String,
    /// Dexcom OAuth client secret
    pub dexcom_client_secret: String,
    /// Redirect URI registered with Dexcom
    pub dexcom_redirect_uri: String,
    /// Dexcom API base URL (sandbox or production)
    pub dexcom_base_url: String,

    // --- Storage ---
    /// GCP project for Firestore; `None` runs with in-memory token storage only
    pub gcp_project_id: Option<String>,
    /// Path to the cached device export (JSON)
    pub export_data_path: PathBuf,

    // --- Server ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Timeout applied to every upstream HTTP call
    pub http_timeout: Duration,
    /// How long an issued OAuth state stays redeemable
    pub oauth_state_ttl: Duration,

    // --- Chat ---
    /// API key for the language model; chat is disabled when absent
    pub openai_api_key: Option<String>,
    /// Chat completion model name
    pub openai_model: String,
    /// Root of the OpenAI-compatible API
    pub openai_api_url: String,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            dexcom_client_id: "test_client_id".to_string(),
            dexcom_client_secret: "test_secret".to_string(),
            dexcom_redirect_uri: "http://localhost:8080/dexcom/callback".to_string(),
            dexcom_base_url: DEXCOM_SANDBOX_URL.to_string(),
            gcp_project_id: None,
            export_data_path: PathBuf::from("data/does-not-exist.json"),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            http_timeout: Duration::from_secs(10),
            oauth_state_ttl: Duration::from_secs(600),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let dexcom_base_url = match env::var("DEXCOM_BASE_URL") {
            Ok(url) => url.trim_end_matches('/').to_string(),
            Err(_) => {
                let dexcom_env = env::var("DEXCOM_ENV").unwrap_or_else(|_| "sandbox".to_string());
                dexcom_base_url_for(&dexcom_env)?.to_string()
            }
        };

        Ok(Self {
            dexcom_client_id: env::var("DEXCOM_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("DEXCOM_CLIENT_ID"))?,
            dexcom_client_secret: env::var("DEXCOM_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("DEXCOM_CLIENT_SECRET"))?,
            dexcom_redirect_uri: env::var("DEXCOM_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("DEXCOM_REDIRECT_URI"))?,
            dexcom_base_url,
            gcp_project_id: env::var("GCP_PROJECT_ID").ok().filter(|p| !p.is_empty()),
            export_data_path: env::var("EXPORT_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/export.json")),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080)?,
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 10)?),
            oauth_state_ttl: Duration::from_secs(parse_or("OAUTH_STATE_TTL_SECS", 600)?),
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_url: env::var("OPENAI_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        })
    }
}

/// Map a `DEXCOM_ENV` value to its API base URL.
pub fn dexcom_base_url_for(dexcom_env: &str) -> Result<&'static str, ConfigError> {
    match dexcom_env.trim().to_ascii_lowercase().as_str() {
        "sandbox" => Ok(DEXCOM_SANDBOX_URL),
        "production" | "prod" => Ok(DEXCOM_PRODUCTION_URL),
        _ => Err(ConfigError::Invalid("DEXCOM_ENV", dexcom_env.to_string())),
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
