// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token store: Firestore-backed, with a transparent in-memory fallback.
//!
//! Every operation first tries Firestore. If Firestore is unreachable (or the
//! service runs offline) the operation is served from a process-local map with
//! the same one-record-per-user invariant. A warning is logged once when the
//! backend goes down, not on every call, and again at info level when it
//! comes back.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::TokenRecord;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-user write locks.
pub type WriteLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Tracks whether the durable backend is currently failing.
#[derive(Default)]
struct BackendHealth {
    degraded: AtomicBool,
    episodes: AtomicU64,
}

impl BackendHealth {
    fn record_failure(&self, operation: &'static str, error: &AppError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            self.episodes.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(
                operation,
                error = %error,
                "Token storage unavailable, using in-memory fallback"
            );
        }
    }

    fn record_success(&self) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            tracing::info!("Token storage reachable again");
        }
    }
}

/// Keyed store for Dexcom token records.
#[derive(Clone)]
pub struct TokenStore {
    db: FirestoreDb,
    /// Records written while Firestore was unavailable.
    fallback: Arc<DashMap<String, TokenRecord>>,
    /// Serializes writes for a single user.
    write_locks: WriteLocks,
    health: Arc<BackendHealth>,
}

impl TokenStore {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            fallback: Arc::new(DashMap::new()),
            write_locks: Arc::new(DashMap::new()),
            health: Arc::new(BackendHealth::default()),
        }
    }

    /// Store with no durable backend; everything lives in memory.
    pub fn in_memory() -> Self {
        Self::new(FirestoreDb::new_offline())
    }

    /// Get the record for `user_id`. Absence is not an error.
    pub async fn get(&self, user_id: &str) -> Option<TokenRecord> {
        let local = self.fallback.get(user_id).map(|r| r.value().clone());

        match self.db.get_tokens(user_id).await {
            Ok(durable) => {
                self.health.record_success();
                newest(durable, local)
            }
            Err(e) => {
                self.health.record_failure("get", &e);
                local
            }
        }
    }

    /// Insert or replace the record for `user_id`.
    ///
    /// `updated_at` is set to now when the caller left it empty.
    pub async fn put(&self, user_id: &str, mut record: TokenRecord) {
        record.user_id = user_id.to_string();
        if record.updated_at.is_none() {
            record.updated_at = Some(Utc::now());
        }

        let lock = self.write_lock(user_id);
        let _guard = lock.lock().await;

        match self.db.set_tokens(&record).await {
            Ok(()) => {
                self.health.record_success();
                // Firestore now holds the latest copy.
                self.fallback.remove(user_id);
            }
            Err(e) => {
                self.health.record_failure("put", &e);
                self.fallback.insert(user_id.to_string(), record);
            }
        }

        tracing::debug!(user_id, "Token record stored");
    }

    /// Remove the record for `user_id`, returning whether one existed.
    pub async fn delete(&self, user_id: &str) -> bool {
        let removed = {
            let lock = self.write_lock(user_id);
            let _guard = lock.lock().await;
            self.delete_locked(user_id).await
        };
        prune_idle_lock(&self.write_locks, user_id);
        removed
    }

    async fn delete_locked(&self, user_id: &str) -> bool {
        let removed_local = self.fallback.remove(user_id).is_some();

        let removed_durable = match self.db.get_tokens(user_id).await {
            Ok(Some(_)) => match self.db.delete_tokens(user_id).await {
                Ok(()) => {
                    self.health.record_success();
                    true
                }
                Err(e) => {
                    self.health.record_failure("delete", &e);
                    false
                }
            },
            Ok(None) => {
                self.health.record_success();
                false
            }
            Err(e) => {
                self.health.record_failure("delete", &e);
                false
            }
        };

        removed_local || removed_durable
    }

    /// Whether the last backend call failed.
    pub fn is_degraded(&self) -> bool {
        self.health.degraded.load(Ordering::SeqCst)
    }

    /// How many times the backend has gone from healthy to failing.
    pub fn degraded_episodes(&self) -> u64 {
        self.health.episodes.load(Ordering::SeqCst)
    }

    fn write_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Drop the lock for `user_id` unless some task still holds or waits on it.
pub(crate) fn prune_idle_lock(locks: &DashMap<String, Arc<Mutex<()>>>, user_id: &str) {
    locks.remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
}

/// Prefer whichever copy was written last.
fn newest(durable: Option<TokenRecord>, local: Option<TokenRecord>) -> Option<TokenRecord> {
    match (durable, local) {
        (Some(d), Some(l)) => Some(if l.updated_at > d.updated_at { l } else { d }),
        (d, l) => d.or(l),
    }
}
