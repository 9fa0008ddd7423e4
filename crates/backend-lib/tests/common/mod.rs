//! Shared setup for the integration tests.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use ems_backend_lib::{
    auth::{hash_password_with_params, HashParams},
    clock::ManualClock,
    config::Settings,
    router::create_router,
    storage::{AccountRecord, AccountStore, FlatFileAccountStore},
    AppState,
};
use ems_common::Role;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tempfile::TempDir;

pub const MANAGER: &str = "manager@example.com";
pub const ASSISTANT: &str = "assistant@example.com";
pub const PASSWORD: &str = "Corr3ct!Horse";

/// Everything a test needs; keep `_temp_dir` alive for the whole test
pub struct TestEnv {
    pub app: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<FlatFileAccountStore>,
    pub _temp_dir: TempDir,
}

/// Cheap scrypt parameters; production cost would make every test take seconds
pub fn fast_params() -> HashParams {
    HashParams::new(4, 8, 1, HashParams::RECOMMENDED_LEN).unwrap()
}

/// Sets up a flat-file store in a temporary directory with one manager and
/// one assistant account, both using [`PASSWORD`]
pub async fn setup_test_env() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FlatFileAccountStore::new(temp_dir.path()).unwrap());

    for (email, role) in [(MANAGER, Role::Manager), (ASSISTANT, Role::Assistant)] {
        let hash = hash_password_with_params(PASSWORD, fast_params()).unwrap();
        store
            .insert(AccountRecord::new(email, hash, role))
            .await
            .unwrap();
    }

    let mut settings = Settings::default();
    settings.storage.path = temp_dir.path().to_path_buf();
    settings.session.secret = Some("integration-test-secret-0123456789".to_string());

    let clock = Arc::new(ManualClock::default());
    let state = Arc::new(AppState::with_clock(store.clone(), settings, clock.clone()));
    let app = create_router(state.clone());

    TestEnv {
        app,
        state,
        clock,
        store,
        _temp_dir: temp_dir,
    }
}

pub fn login_request(email: &str, password: &str) -> Request<Body> {
    let body = serde_json::json!({ "email": email, "password": password });
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_with_cookie(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
