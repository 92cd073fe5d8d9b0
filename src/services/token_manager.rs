// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dexcom token lifecycle: validity checks, refresh-on-expiry, persistence.
//!
//! The manager never keeps a copy of a token record between calls. Every
//! decision starts from a fresh read of the token store, so it never acts on
//! stale expiry data.

use crate::db::token_store::prune_idle_lock;
use crate::db::TokenStore;
use crate::error::AppError;
use crate::models::TokenRecord;
use crate::services::dexcom::DexcomClient;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Shared refresh locks, one per user.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Connection state reported by check-status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub token_valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Owns the validity check and refresh protocol for Dexcom tokens.
#[derive(Clone)]
pub struct TokenManager {
    store: TokenStore,
    client: DexcomClient,
    /// Per-user mutex to serialize refreshes.
    refresh_locks: RefreshLocks,
}

impl TokenManager {
    pub fn new(store: TokenStore, client: DexcomClient) -> Self {
        Self {
            store,
            client,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// True iff a record exists and its access token has not expired.
    pub async fn is_valid(&self, user_id: &str) -> bool {
        self.store
            .get(user_id)
            .await
            .is_some_and(|record| record.is_valid_at(Utc::now()))
    }

    /// The current access token, or `None` if missing or expired.
    ///
    /// Never returns an expired token; use [`TokenManager::ensure_fresh`] to
    /// refresh one.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Option<String> {
        self.store
            .get(user_id)
            .await
            .filter(|record| record.is_valid_at(Utc::now()))
            .map(|record| record.access_token)
    }

    /// Return a usable access token, refreshing it with Dexcom if expired.
    ///
    /// On refresh failure the stored record is left untouched and `None` is
    /// returned; the refresh is not retried.
    pub async fn ensure_fresh(&self, user_id: &str) -> Option<String> {
        let record = self.store.get(user_id).await?;
        if record.is_valid_at(Utc::now()) {
            return Some(record.access_token);
        }

        // Only one task per user performs the refresh.
        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let record = self.store.get(user_id).await?;
        if record.is_valid_at(Utc::now()) {
            return Some(record.access_token);
        }

        if record.refresh_token.is_empty() {
            tracing::warn!(user_id, "Access token expired and no refresh token stored");
            return None;
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let grant = match self.client.exchange_refresh_token(&record.refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed");
                return None;
            }
        };

        let refresh_token = grant
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or(record.refresh_token);

        let refreshed = TokenRecord::issued(
            user_id,
            grant.access_token,
            refresh_token,
            grant.expires_in,
            Utc::now(),
        );
        let access_token = refreshed.access_token.clone();
        self.store.put(user_id, refreshed).await;

        tracing::info!(user_id, "Token refreshed and stored");
        Some(access_token)
    }

    /// Exchange an authorization code and store the resulting tokens.
    pub async fn connect(&self, user_id: &str, code: &str) -> Result<TokenRecord, AppError> {
        let grant = self.client.exchange_code(code).await?;

        let record = TokenRecord::issued(
            user_id,
            grant.access_token,
            grant.refresh_token,
            grant.expires_in,
            Utc::now(),
        );
        self.store.put(user_id, record.clone()).await;

        tracing::info!(
            user_id,
            expires_at = %format_utc_rfc3339(record.expires_at),
            "Dexcom authorization complete, tokens stored"
        );
        Ok(record)
    }

    /// Report whether the user is connected and whether the token is valid.
    pub async fn status(&self, user_id: &str) -> ConnectionStatus {
        match self.store.get(user_id).await {
            Some(record) => ConnectionStatus {
                connected: true,
                token_valid: record.is_valid_at(Utc::now()),
                expires_at: Some(record.expires_at),
            },
            None => ConnectionStatus {
                connected: false,
                token_valid: false,
                expires_at: None,
            },
        }
    }

    /// Forget the user's tokens. Returns whether any were stored.
    pub async fn disconnect(&self, user_id: &str) -> bool {
        let deleted = self.store.delete(user_id).await;
        prune_idle_lock(&self.refresh_locks, user_id);
        tracing::info!(user_id, deleted, "Dexcom disconnect");
        deleted
    }

    pub fn client(&self) -> &DexcomClient {
        &self.client
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }
}
