// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deterministic synthetic glucose curve, the last-resort data tier.

use crate::models::{DataSource, GlucoseReading, GlucoseWindow, Trend};
use chrono::{DateTime, Duration, Utc};

const BASE_MGDL: f64 = 110.0;
const SWING_MGDL: f64 = 30.0;

/// Sample spacing (minutes) and oscillation period (samples) for a window.
fn sampling(window: GlucoseWindow) -> (i64, i64) {
    match window.hours() {
        h if h <= 6 => (15, 8),
        h if h <= 12 => (30, 12),
        _ => (60, 24),
    }
}

/// Generate readings covering `window` and ending at `now`, oldest first.
///
/// The same `window` and `now` always produce the same readings.
pub fn synthetic_readings(window: GlucoseWindow, now: DateTime<Utc>) -> Vec<GlucoseReading> {
    let (spacing_minutes, period) = sampling(window);
    let count = window.hours() * 60 / spacing_minutes;
    let half = (period / 2) as f64;

    let mut readings: Vec<GlucoseReading> = (0..count)
        .rev()
        .map(|i| {
            let offset = ((i % period) as f64 - half) / half;
            let value = ((BASE_MGDL + offset * SWING_MGDL) * 10.0).round() / 10.0;
            GlucoseReading {
                timestamp: now - Duration::minutes(spacing_minutes * i),
                value_mgdl: value,
                trend: Trend::Unknown,
                trend_rate: None,
                source: DataSource::Synthetic,
            }
        })
        .collect();

    for i in 1..readings.len() {
        readings[i].trend = Trend::between(readings[i - 1].value_mgdl, readings[i].value_mgdl);
    }

    readings
}
