// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glucose Tracker API Server
//!
//! Serves continuous glucose monitor readings from Dexcom, a device export,
//! or a synthetic curve, plus a chat assistant that can discuss them.

use glucose_tracker::{config::Config, db::FirestoreDb, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often abandoned OAuth states are swept.
const STATE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        dexcom_base_url = %config.dexcom_base_url,
        "Starting Glucose Tracker API"
    );

    // Token storage: Firestore when configured and reachable, memory otherwise
    let db = match config.gcp_project_id.as_deref() {
        Some(project_id) => match FirestoreDb::new(project_id).await {
            Ok(db) => db,
            Err(e) => {
                tracing::warn!(error = %e, "Firestore unavailable, tokens kept in memory");
                FirestoreDb::new_offline()
            }
        },
        None => {
            tracing::info!("GCP_PROJECT_ID not set, tokens kept in memory");
            FirestoreDb::new_offline()
        }
    };

    let state = Arc::new(AppState::new(config.clone(), db)?);
    tracing::info!(
        export_path = %config.export_data_path.display(),
        chat_enabled = state.chat.is_enabled(),
        "Services initialized"
    );

    spawn_state_purge(state.clone());

    let app = glucose_tracker::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically drop OAuth states nobody came back for.
fn spawn_state_purge(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = state.oauth_states.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Expired OAuth states purged");
            }
        }
    });
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("glucose_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
