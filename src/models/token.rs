//! Dexcom OAuth credential record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A user's Dexcom OAuth tokens, one record per `user_id`.
///
/// Stored in Firestore with `user_id` as the document ID.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Opaque user identifier (also used as document ID)
    pub user_id: String,
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived renewal token
    pub refresh_token: String,
    /// When the access token stops being accepted
    pub expires_at: DateTime<Utc>,
    /// Last write time; filled in by the store when absent
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lifetimes are clamped to this many seconds either way.
const MAX_LIFETIME_SECS: i64 = 100 * 365 * 24 * 60 * 60;

impl TokenRecord {
    /// Build a record from a token exchange response received at `now`.
    pub fn issued(
        user_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let lifetime = expires_in_secs.clamp(-MAX_LIFETIME_SECS, MAX_LIFETIME_SECS);
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: now + Duration::seconds(lifetime),
            updated_at: Some(now),
        }
    }

    /// A token expiring exactly at `now` is already expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// Tokens never end up in logs.
impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
