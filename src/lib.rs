// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glucose Tracker: continuous glucose monitor data behind a small HTTP API
//!
//! Readings come from the Dexcom API when the user has connected an account,
//! otherwise from a device export on disk, otherwise from a synthetic curve.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{FirestoreDb, TokenStore};
use error::AppError;
use services::{
    ChatService, DexcomClient, ExportSource, GlucoseResolver, LanguageModelClient,
    OAuthStateRegistry, TokenManager,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenManager,
    pub oauth_states: OAuthStateRegistry,
    pub export: ExportSource,
    pub resolver: GlucoseResolver,
    pub chat: ChatService,
}

impl AppState {
    /// Wire up every service from `config` on top of `db`.
    pub fn new(config: Config, db: FirestoreDb) -> Result<Self, AppError> {
        let store = TokenStore::new(db);
        let tokens = TokenManager::new(store, DexcomClient::from_config(&config)?);
        let export = ExportSource::new(config.export_data_path.clone());
        let resolver = GlucoseResolver::new(tokens.clone(), export.clone());
        let chat = ChatService::new(LanguageModelClient::from_config(&config)?, resolver.clone())?;

        Ok(Self {
            oauth_states: OAuthStateRegistry::new(config.oauth_state_ttl),
            config,
            tokens,
            export,
            resolver,
            chat,
        })
    }
}
