// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tiered glucose data resolution.
//!
//! One pass through three tiers, stopping at the first that answers:
//! 1. Live: Dexcom API with a valid (or freshly refreshed) token
//! 2. Cached export: the device export on disk, if it has readings
//! 3. Synthetic: generated locally, always non-empty
//!
//! Failures in any tier are logged and absorbed; the caller always gets a
//! tagged result.

use crate::error::AppError;
use crate::models::{DataSource, GlucoseReading, GlucoseWindow, ResolvedReadings};
use crate::services::export::ExportSource;
use crate::services::synthetic::synthetic_readings;
use crate::services::token_manager::TokenManager;
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct GlucoseResolver {
    tokens: TokenManager,
    export: ExportSource,
}

impl GlucoseResolver {
    pub fn new(tokens: TokenManager, export: ExportSource) -> Self {
        Self { tokens, export }
    }

    /// Resolve readings for `user_id` over `window`, oldest first.
    pub async fn resolve(&self, user_id: &str, window: GlucoseWindow) -> ResolvedReadings {
        let now = Utc::now();

        match self.fetch_live(user_id, window, now).await {
            Ok(Some(readings)) => {
                tracing::info!(user_id, %window, count = readings.len(), source = "live", "Glucose data resolved");
                return resolved(DataSource::Live, readings, window);
            }
            Ok(None) => {
                tracing::debug!(user_id, "No usable Dexcom token, skipping live tier");
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    upstream_status = ?e.upstream_status(),
                    "Live Dexcom fetch failed, falling back"
                );
            }
        }

        let cached = self.export.readings(window).await;
        if !cached.is_empty() {
            tracing::info!(user_id, %window, count = cached.len(), source = "cached_export", "Glucose data resolved");
            return resolved(DataSource::CachedExport, cached, window);
        }
        tracing::debug!(path = %self.export.path().display(), "Export has no readings, using synthetic data");

        let readings = synthetic_readings(window, now);
        tracing::info!(user_id, %window, count = readings.len(), source = "synthetic", "Glucose data resolved");
        resolved(DataSource::Synthetic, readings, window)
    }

    /// `Ok(None)` means no token could be obtained.
    async fn fetch_live(
        &self,
        user_id: &str,
        window: GlucoseWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<GlucoseReading>>, AppError> {
        let Some(access_token) = self.tokens.ensure_fresh(user_id).await else {
            return Ok(None);
        };

        self.tokens
            .client()
            .fetch_readings(&access_token, now - window.duration(), now)
            .await
            .map(Some)
    }
}

fn resolved(
    source: DataSource,
    readings: Vec<GlucoseReading>,
    window: GlucoseWindow,
) -> ResolvedReadings {
    ResolvedReadings {
        source,
        readings,
        window,
    }
}
