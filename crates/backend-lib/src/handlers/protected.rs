// ============================
// crates/backend-lib/src/handlers/protected.rs
// ============================
//! Routes behind the role gate.
use crate::auth::SessionClaims;
use axum::{Extension, Json};
use ems_common::MessageResponse;

/// `GET /protected`: greets whoever the gate let through
pub async fn protected(Extension(claims): Extension<SessionClaims>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Hello {}, you have access!",
        claims.role
    )))
}
