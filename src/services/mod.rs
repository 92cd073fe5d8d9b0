// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod chat;
pub mod dexcom;
pub mod export;
pub mod language_model;
pub mod oauth_state;
pub mod resolver;
pub mod synthetic;
pub mod token_manager;

pub use chat::{ChatReply, ChatService};
pub use dexcom::DexcomClient;
pub use export::{ExportSource, ExportSummary};
pub use language_model::LanguageModelClient;
pub use oauth_state::OAuthStateRegistry;
pub use resolver::GlucoseResolver;
pub use token_manager::{ConnectionStatus, TokenManager};
