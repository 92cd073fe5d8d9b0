// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Timestamp layout used by the Dexcom v2 API and device exports.
const DEXCOM_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp the way Dexcom expects query bounds (no offset).
pub fn format_dexcom_timestamp(date: DateTime<Utc>) -> String {
    date.format(DEXCOM_TIMESTAMP_FORMAT).to_string()
}

/// Parse a Dexcom timestamp, with or without an explicit offset.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_dexcom_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, DEXCOM_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
