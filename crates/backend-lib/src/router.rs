// ============================
// ems-backend-lib/src/router.rs
// ============================
//! HTTP router.
use crate::handlers::{auth, protected};
use crate::middleware::{authorize, Authorize};
use crate::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/protected", get(protected::protected))
        .route_layer(from_fn_with_state(Authorize::any_role(&state), authorize));

    let router = Router::new()
        .route("/auth/login", post(auth::login))
        // Path existing frontends post to
        .route("/auth/employeelogin", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/check-session", get(auth::check_session))
        .merge(gated)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    match state.settings.server.cors_origin.as_deref().map(cors_layer) {
        Some(Some(cors)) => router.layer(cors),
        _ => router,
    }
}

/// CORS for a single frontend origin that sends the session cookie
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            warn!("ignoring unusable cors origin {origin:?}: {e}");
            return None;
        },
    };
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}
