// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use glucose_tracker::config::Config;
use glucose_tracker::db::FirestoreDb;
use glucose_tracker::routes::create_router;
use glucose_tracker::AppState;
use std::path::PathBuf;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Build an app from `config` with offline token storage.
#[allow(dead_code)]
pub fn create_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::new(config, FirestoreDb::new_offline()).expect("Failed to build app state"),
    );
    (create_router(state.clone()), state)
}

/// Create a test app with offline storage, no export and no chat model.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_app_with(Config::test_default())
}

/// Test config whose Dexcom client talks to `base_url`.
#[allow(dead_code)]
pub fn config_with_dexcom(base_url: &str) -> Config {
    let mut config = Config::test_default();
    config.dexcom_base_url = base_url.to_string();
    config
}

/// Write a device export to a unique temp file.
#[allow(dead_code)]
pub fn write_export(contents: &str) -> PathBuf {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let path = std::env::temp_dir().join(format!(
        "glucose-it-export-{}-{}.json",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::write(&path, contents).expect("Failed to write export");
    path
}

/// Unique user id for test isolation.
#[allow(dead_code)]
pub fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-user-{}", nanos)
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
