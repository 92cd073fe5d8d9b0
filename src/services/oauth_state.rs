// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-use OAuth `state` tokens binding a Dexcom redirect to a user.
//!
//! Each state is 32 bytes from the system CSPRNG, URL-safe base64 encoded.
//! Redeeming a state removes it in the same map operation, so a state can be
//! consumed at most once even when callbacks race. States older than the
//! configured TTL are rejected.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes of entropy per state token.
const STATE_BYTES: usize = 32;

struct PendingAuthorization {
    user_id: String,
    issued_at: Instant,
}

/// Registry of outstanding authorization flows.
#[derive(Clone)]
pub struct OAuthStateRegistry {
    pending: Arc<DashMap<String, PendingAuthorization>>,
    rng: SystemRandom,
    ttl: Duration,
}

impl OAuthStateRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            rng: SystemRandom::new(),
            ttl,
        }
    }

    /// Issue a fresh state for `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<String, AppError> {
        loop {
            let mut bytes = [0u8; STATE_BYTES];
            self.rng.fill(&mut bytes).map_err(|_| {
                AppError::Internal(anyhow::anyhow!("System random source unavailable"))
            })?;
            let state = URL_SAFE_NO_PAD.encode(bytes);

            // A collision is astronomically unlikely; never overwrite one anyway.
            if let Entry::Vacant(slot) = self.pending.entry(state.clone()) {
                slot.insert(PendingAuthorization {
                    user_id: user_id.to_string(),
                    issued_at: Instant::now(),
                });
                return Ok(state);
            }
        }
    }

    /// Redeem `state`, returning the user that started the flow.
    ///
    /// Returns `None` for unknown, already used, or expired states.
    pub fn consume(&self, state: &str) -> Option<String> {
        let (_, pending) = self.pending.remove(state)?;

        if pending.issued_at.elapsed() > self.ttl {
            tracing::warn!("Rejected expired OAuth state");
            return None;
        }

        Some(pending.user_id)
    }

    /// Drop states that can no longer be redeemed. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.pending.len();
        let ttl = self.ttl;
        self.pending.retain(|_, p| p.issued_at.elapsed() <= ttl);
        before.saturating_sub(self.pending.len())
    }

    /// Number of outstanding states.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OAuthStateRegistry {
        OAuthStateRegistry::new(Duration::from_secs(600))
    }

    #[test]
    fn test_issue_and_consume() {
        let reg = registry();
        let state = reg.issue("alice").unwrap();

        assert_eq!(reg.consume(&state), Some("alice".to_string()));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_consume_twice_fails() {
        let reg = registry();
        let state = reg.issue("alice").unwrap();

        assert!(reg.consume(&state).is_some());
        assert_eq!(reg.consume(&state), None);
    }

    #[test]
    fn test_unknown_state_rejected() {
        let reg = registry();
        reg.issue("alice").unwrap();
        assert_eq!(reg.consume("forged"), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_state_is_url_safe_and_long() {
        let reg = registry();
        let state = reg.issue("alice").unwrap();

        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(state.len(), 43);
        assert!(!state.contains('+'));
        assert!(!state.contains('/'));
        assert!(!state.contains('='));
    }

    #[test]
    fn test_states_are_unique() {
        let reg = registry();
        let a = reg.issue("alice").unwrap();
        let b = reg.issue("alice").unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_expired_state_rejected() {
        let reg = OAuthStateRegistry::new(Duration::ZERO);
        let state = reg.issue("alice").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(reg.consume(&state), None);
    }

    #[test]
    fn test_purge_expired() {
        let reg = OAuthStateRegistry::new(Duration::ZERO);
        reg.issue("alice").unwrap();
        reg.issue("bob").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(reg.purge_expired(), 2);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_concurrent_consume_single_winner() {
        let reg = registry();
        let state = reg.issue("alice").unwrap();

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| reg.consume(&state).is_some()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });

        assert_eq!(winners, 1);
    }
}
