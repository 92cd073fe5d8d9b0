//! Database layer (Firestore with an in-memory fallback).

pub mod firestore;
pub mod token_store;

pub use firestore::FirestoreDb;
pub use token_store::TokenStore;

/// Collection names as constants.
pub mod collections {
    /// Dexcom OAuth tokens (keyed by user_id)
    pub const TOKENS: &str = "dexcom_tokens";
}
