// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dexcom API client.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization-code and refresh-token exchanges
//! - EGV (glucose reading) fetches over a time window
//!
//! Nothing here retries; callers decide how to react to failures.

use crate::config::Config;
use crate::error::AppError;
use crate::models::glucose::is_plausible_mgdl;
use crate::models::{DataSource, GlucoseReading, Trend};
use crate::time_utils::{format_dexcom_timestamp, parse_dexcom_timestamp};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// OAuth scope requested from Dexcom.
const OAUTH_SCOPE: &str = "offline_access";

/// Longest access-token lifetime accepted from the token endpoint (one year).
pub const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 60 * 60;

/// Dexcom API client.
#[derive(Clone)]
pub struct DexcomClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl DexcomClient {
    /// Create a client with OAuth credentials and a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.dexcom_base_url.clone(),
            config.dexcom_client_id.clone(),
            config.dexcom_client_secret.clone(),
            config.dexcom_redirect_uri.clone(),
            config.http_timeout,
        )
    }

    /// Build the URL the user is sent to for authorizing access.
    pub fn build_authorization_url(&self, state: &str) -> String {
        format!(
            "{}/v2/oauth2/login?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             state={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthorizationGrant, AppError> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamAuth {
                status: None,
                body: format!("Token exchange request failed: {}", e),
            })?;

        let grant: AuthorizationGrant = self.auth_response_json(response).await?;
        check_expires_in(grant.expires_in)?;
        Ok(grant)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Dexcom may omit a new refresh token; the caller keeps the old one then.
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshGrant, AppError> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamAuth {
                status: None,
                body: format!("Token refresh request failed: {}", e),
            })?;

        let grant: RefreshGrant = self.auth_response_json(response).await?;
        check_expires_in(grant.expires_in)?;
        Ok(grant)
    }

    /// Fetch glucose readings in `[start, end]`, oldest first.
    ///
    /// A successful response with no readings yields an empty vector.
    pub async fn fetch_readings(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>, AppError> {
        let url = format!("{}/v2/users/self/egvs", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("startDate", format_dexcom_timestamp(start)),
                ("endDate", format_dexcom_timestamp(end)),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamData {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                tracing::warn!("Dexcom rate limit hit (429)");
            }
            return Err(AppError::UpstreamData {
                status: Some(status.as_u16()),
                body,
            });
        }

        let page: EgvsResponse = response.json().await.map_err(|e| AppError::UpstreamData {
            status: Some(status.as_u16()),
            body: format!("Malformed EGV payload: {}", e),
        })?;

        Ok(page.into_readings())
    }

    fn token_url(&self) -> String {
        format!("{}/v2/oauth2/token", self.base_url)
    }

    /// Check a token endpoint response and parse its JSON body.
    async fn auth_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Dexcom token endpoint rejected request");
            return Err(AppError::UpstreamAuth {
                status: Some(status.as_u16()),
                body,
            });
        }

        response.json().await.map_err(|e| AppError::UpstreamAuth {
            status: Some(status.as_u16()),
            body: format!("Failed to parse token response: {}", e),
        })
    }
}

/// Reject token lifetimes that are negative or absurdly long.
fn check_expires_in(expires_in: i64) -> Result<(), AppError> {
    if (0..=MAX_EXPIRES_IN_SECS).contains(&expires_in) {
        return Ok(());
    }
    tracing::error!(expires_in, "Dexcom token endpoint returned implausible expires_in");
    Err(AppError::UpstreamAuth {
        status: None,
        body: format!("Implausible expires_in: {}", expires_in),
    })
}

/// Token response for the authorization-code grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

/// Token response for the refresh-token grant.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

/// EGV list response (v2 uses `egvs`, v3 uses `records`).
#[derive(Debug, Clone, Deserialize)]
pub struct EgvsResponse {
    #[serde(alias = "records")]
    pub egvs: Vec<Egv>,
}

/// A single EGV record as Dexcom returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Egv {
    #[serde(default)]
    pub system_time: Option<String>,
    /// Null when the sensor reports only "high"/"low"
    pub value: Option<f64>,
    #[serde(default)]
    pub trend: Option<String>,
    #[serde(default)]
    pub trend_rate: Option<f64>,
}

impl EgvsResponse {
    /// Validate records into readings, dropping unusable ones, oldest first.
    pub fn into_readings(self) -> Vec<GlucoseReading> {
        let total = self.egvs.len();
        let mut readings: Vec<GlucoseReading> =
            self.egvs.into_iter().filter_map(Egv::into_reading).collect();

        if readings.len() < total {
            tracing::debug!(
                dropped = total - readings.len(),
                kept = readings.len(),
                "Dropped malformed or implausible EGV records"
            );
        }

        readings.sort_by_key(|r| r.timestamp);
        readings
    }
}

impl Egv {
    fn into_reading(self) -> Option<GlucoseReading> {
        let timestamp = parse_dexcom_timestamp(self.system_time.as_deref()?)?;
        let value = self.value.filter(|v| is_plausible_mgdl(*v))?;

        Some(GlucoseReading {
            timestamp,
            value_mgdl: value,
            trend: self
                .trend
                .as_deref()
                .map(Trend::from_dexcom)
                .unwrap_or(Trend::Unknown),
            trend_rate: self.trend_rate,
            source: DataSource::Live,
        })
    }
}
