// ============================
// crates/backend-lib/src/middleware/authorize.rs
// ============================
//! Role gate for routes that need a session.
use crate::auth::SessionIssuer;
use crate::error::AppError;
use crate::handlers::auth::extract_session_token;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use ems_common::Role;
use std::sync::Arc;
use tracing::warn;

/// Which sessions a route accepts. Use with
/// `axum::middleware::from_fn_with_state(gate, authorize)`.
#[derive(Clone)]
pub struct Authorize {
    sessions: Arc<dyn SessionIssuer>,
    cookie_name: String,
    /// `None` admits every role
    allowed: Option<Arc<[Role]>>,
}

impl Authorize {
    /// Any valid session
    pub fn any_role(state: &AppState) -> Self {
        Self {
            sessions: state.sessions.clone(),
            cookie_name: state.settings.session.cookie_name.clone(),
            allowed: None,
        }
    }

    /// A valid session whose role is one of `roles`. Gate manager-only
    /// routes with this; `/protected` admits both roles and uses
    /// [`Authorize::any_role`].
    ///
    /// ```
    /// use axum::{middleware::from_fn_with_state, routing::get, Router};
    /// use ems_backend_lib::{
    ///     middleware::{authorize, Authorize},
    ///     AppState,
    /// };
    /// use ems_common::Role;
    /// use std::sync::Arc;
    ///
    /// fn manager_routes(state: &AppState) -> Router<Arc<AppState>> {
    ///     Router::new()
    ///         .route("/reports", get(|| async { "reports" }))
    ///         .route_layer(from_fn_with_state(
    ///             Authorize::roles(state, &[Role::Manager]),
    ///             authorize,
    ///         ))
    /// }
    /// ```
    pub fn roles(state: &AppState, roles: &[Role]) -> Self {
        Self {
            allowed: Some(roles.into()),
            ..Self::any_role(state)
        }
    }

    fn admits(&self, role: Role) -> bool {
        self.allowed
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&role))
    }
}

/// Reject requests without an acceptable session; otherwise hand the
/// verified [`SessionClaims`](crate::auth::SessionClaims) to the handler as
/// a request extension.
pub async fn authorize(
    State(gate): State<Authorize>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_session_token(request.headers(), &gate.cookie_name)
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

    let claims = gate.sessions.verify(&token)?;

    if !gate.admits(claims.role) {
        warn!(identifier = %claims.sub, role = %claims.role, path = %request.uri().path(), "role not allowed");
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
