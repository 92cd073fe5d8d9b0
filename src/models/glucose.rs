// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glucose readings and the request windows they are served for.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Lowest value a sensor reading can plausibly report (mg/dL).
pub const MIN_PLAUSIBLE_MGDL: f64 = 40.0;
/// Highest value a sensor reading can plausibly report (mg/dL).
pub const MAX_PLAUSIBLE_MGDL: f64 = 400.0;

/// Change between consecutive readings (mg/dL) treated as a trend.
const TREND_THRESHOLD_MGDL: f64 = 5.0;

/// Direction of glucose change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
    Unknown,
}

impl Trend {
    /// Map a Dexcom trend arrow name to a trend.
    pub fn from_dexcom(arrow: &str) -> Self {
        match arrow {
            "doubleUp" | "singleUp" | "fortyFiveUp" => Trend::Rising,
            "doubleDown" | "singleDown" | "fortyFiveDown" => Trend::Falling,
            "flat" => Trend::Stable,
            _ => Trend::Unknown,
        }
    }

    /// Trend implied by moving from `previous` to `current`.
    pub fn between(previous: f64, current: f64) -> Self {
        if current > previous + TREND_THRESHOLD_MGDL {
            Trend::Rising
        } else if current < previous - TREND_THRESHOLD_MGDL {
            Trend::Falling
        } else {
            Trend::Stable
        }
    }
}

/// Where a set of readings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum DataSource {
    /// Fetched from the Dexcom API with the user's token
    Live,
    /// Read from a previously exported data file
    CachedExport,
    /// Generated locally
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::CachedExport => "cached_export",
            DataSource::Synthetic => "synthetic",
        }
    }
}

/// A single estimated glucose value (EGV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GlucoseReading {
    pub timestamp: DateTime<Utc>,
    pub value_mgdl: f64,
    pub trend: Trend,
    pub trend_rate: Option<f64>,
    pub source: DataSource,
}

/// Whether a value lies in the plausible sensor range.
pub fn is_plausible_mgdl(value: f64) -> bool {
    (MIN_PLAUSIBLE_MGDL..=MAX_PLAUSIBLE_MGDL).contains(&value)
}

/// Supported request windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum GlucoseWindow {
    #[serde(rename = "3h")]
    Hours3,
    #[serde(rename = "6h")]
    Hours6,
    #[serde(rename = "12h")]
    Hours12,
    #[default]
    #[serde(rename = "24h")]
    Hours24,
}

impl GlucoseWindow {
    pub const ALL: [GlucoseWindow; 4] = [
        GlucoseWindow::Hours3,
        GlucoseWindow::Hours6,
        GlucoseWindow::Hours12,
        GlucoseWindow::Hours24,
    ];

    pub fn hours(&self) -> i64 {
        match self {
            GlucoseWindow::Hours3 => 3,
            GlucoseWindow::Hours6 => 6,
            GlucoseWindow::Hours12 => 12,
            GlucoseWindow::Hours24 => 24,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::hours(self.hours())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseWindow::Hours3 => "3h",
            GlucoseWindow::Hours6 => "6h",
            GlucoseWindow::Hours12 => "12h",
            GlucoseWindow::Hours24 => "24h",
        }
    }
}

impl std::fmt::Display for GlucoseWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GlucoseWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GlucoseWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| format!("Invalid range {:?}. Must be one of: 3h, 6h, 12h, 24h", s))
    }
}

/// Readings for one request, tagged with where they came from.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ResolvedReadings {
    pub source: DataSource,
    pub readings: Vec<GlucoseReading>,
    pub window: GlucoseWindow,
}
