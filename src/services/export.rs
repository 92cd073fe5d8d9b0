// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached device export: readings from a Dexcom Clarity export on disk.
//!
//! The export is a JSON array of rows keyed by the Clarity CSV column names.
//! Only `EGV` rows are used. The parsed file is kept in memory for a few
//! minutes so repeated requests do not re-read it.

use crate::models::glucose::is_plausible_mgdl;
use crate::models::{DataSource, GlucoseReading, GlucoseWindow, Trend};
use crate::time_utils::parse_dexcom_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How long a parsed export stays cached.
const EXPORT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// One row of a Clarity export.
#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(rename = "Event Type", default)]
    event_type: Option<String>,
    #[serde(rename = "Timestamp (YYYY-MM-DDThh:mm:ss)", default)]
    timestamp: Option<String>,
    /// Number, numeric string, or "Low"/"High"
    #[serde(rename = "Glucose Value (mg/dL)", default)]
    glucose_value: Option<serde_json::Value>,
}

impl ExportRow {
    fn glucose_mgdl(&self) -> Option<f64> {
        let value = match self.glucose_value.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        is_plausible_mgdl(value).then_some(value)
    }
}

/// Parse an export into readings, oldest first.
pub fn parse_export(json: &str) -> Result<Vec<GlucoseReading>, serde_json::Error> {
    let rows: Vec<ExportRow> = serde_json::from_str(json)?;

    let mut points: Vec<(DateTime<Utc>, f64)> = rows
        .iter()
        .filter(|row| row.event_type.as_deref() == Some("EGV"))
        .filter_map(|row| {
            let timestamp = parse_dexcom_timestamp(row.timestamp.as_deref()?)?;
            Some((timestamp, row.glucose_mgdl()?))
        })
        .collect();
    points.sort_by_key(|(timestamp, _)| *timestamp);

    let mut previous: Option<f64> = None;
    let readings = points
        .into_iter()
        .map(|(timestamp, value)| {
            let trend = previous.map_or(Trend::Unknown, |p| Trend::between(p, value));
            previous = Some(value);
            GlucoseReading {
                timestamp,
                value_mgdl: value,
                trend,
                trend_rate: None,
                source: DataSource::CachedExport,
            }
        })
        .collect();

    Ok(readings)
}

/// First and last reading times.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Aggregate statistics over the whole export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExportSummary {
    pub total_readings: usize,
    pub date_range: Option<DateRange>,
    pub avg_glucose: f64,
    pub min_glucose: f64,
    pub max_glucose: f64,
}

struct CachedExport {
    readings: Arc<Vec<GlucoseReading>>,
    loaded_at: Instant,
}

/// Reads the export file at a fixed path.
#[derive(Clone)]
pub struct ExportSource {
    path: PathBuf,
    cache: Arc<RwLock<Option<CachedExport>>>,
}

impl ExportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Readings within `window` of the most recent exported reading.
    ///
    /// A missing or unreadable export yields no readings.
    pub async fn readings(&self, window: GlucoseWindow) -> Vec<GlucoseReading> {
        let all = self.load().await;
        let Some(latest) = all.last().map(|r| r.timestamp) else {
            return Vec::new();
        };

        let cutoff = latest - window.duration();
        all.iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Summary statistics for the whole export.
    pub async fn summary(&self) -> ExportSummary {
        let all = self.load().await;

        let (Some(first), Some(last)) = (all.first(), all.last()) else {
            return ExportSummary {
                total_readings: 0,
                date_range: None,
                avg_glucose: 0.0,
                min_glucose: 0.0,
                max_glucose: 0.0,
            };
        };

        let values = all.iter().map(|r| r.value_mgdl);
        let sum: f64 = values.clone().sum();
        let avg = sum / all.len() as f64;

        ExportSummary {
            total_readings: all.len(),
            date_range: Some(DateRange {
                start: first.timestamp,
                end: last.timestamp,
            }),
            avg_glucose: (avg * 10.0).round() / 10.0,
            min_glucose: values.clone().fold(f64::INFINITY, f64::min),
            max_glucose: values.fold(f64::NEG_INFINITY, f64::max),
        }
    }

    async fn load(&self) -> Arc<Vec<GlucoseReading>> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.loaded_at.elapsed() < EXPORT_CACHE_TTL {
                return cached.readings.clone();
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have reloaded while we waited for the write lock.
        if let Some(cached) = cache.as_ref() {
            if cached.loaded_at.elapsed() < EXPORT_CACHE_TTL {
                return cached.readings.clone();
            }
        }

        // A failed load is cached for the same TTL as a good one.
        let readings = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => match parse_export(&contents) {
                Ok(readings) => {
                    tracing::info!(
                        path = %self.path.display(),
                        count = readings.len(),
                        "Loaded glucose export"
                    );
                    readings
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Malformed glucose export");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Export file not readable");
                Vec::new()
            }
        };

        let readings = Arc::new(readings);
        *cache = Some(CachedExport {
            readings: readings.clone(),
            loaded_at: Instant::now(),
        });
        readings
    }
}
