// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Login, logout and session check.
use crate::auth::LoginOutcome;
use crate::config::SessionSettings;
use crate::error::AppError;
use crate::validation::{validate_identifier, validate_secret};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use ems_common::{LoginRequest, LoginResponse, MessageResponse, SessionStatus, SessionUser};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(LoginRequest { email, password }) =
        payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let password = SecretString::from(password);

    validate_identifier(&email)?;
    validate_secret(password.expose_secret())?;

    match state.guard.attempt_login(&email, &password).await? {
        LoginOutcome::Accepted { role, session } => {
            let cookie = session_cookie(&state.settings.session, &session.token)?;
            let body = LoginResponse {
                login_status: true,
                role,
                token: session.token,
            };
            Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
        },
        LoginOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}

/// `POST /auth/logout`: revokes the presented token, if any, and always
/// clears the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let settings = &state.settings.session;
    if let Some(token) = extract_session_token(&headers, &settings.cookie_name) {
        match state.sessions.verify(&token) {
            Ok(claims) => state.sessions.revoke(&claims),
            Err(e) => debug!("logout with unusable token: {e}"),
        }
    }

    let cookie = clear_session_cookie(settings)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse::new("Logged out successfully")),
    )
        .into_response())
}

/// `GET /auth/check-session`: never fails, only reports
pub async fn check_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    let Some(token) = extract_session_token(&headers, &state.settings.session.cookie_name) else {
        return Json(SessionStatus::anonymous());
    };

    match state.sessions.verify(&token) {
        Ok(claims) => Json(SessionStatus::authenticated(SessionUser {
            identifier: claims.sub,
            role: claims.role,
            expires_at: claims.exp,
        })),
        Err(e) => {
            debug!("session check failed: {e}");
            Json(SessionStatus::anonymous())
        },
    }
}

/// `Set-Cookie` value carrying a fresh session token
pub(crate) fn session_cookie(
    settings: &SessionSettings,
    token: &str,
) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_name, settings.ttl_secs
    );
    // Only mark cookies secure when the frontend is served over HTTPS.
    if settings.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

fn clear_session_cookie(settings: &SessionSettings) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        settings.cookie_name
    );
    if settings.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

/// Session token from `Authorization: Bearer`, falling back to the cookie
pub(crate) fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == cookie_name)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings::default()
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&settings(), "abc.def.ghi").unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("token=abc.def.ghi; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(!cookie.contains("Secure"));

        let secure = SessionSettings {
            cookie_secure: true,
            ..settings()
        };
        let cookie = session_cookie(&secure, "t").unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_clear_session_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&settings()).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(
            extract_session_token(&headers, "token").as_deref(),
            Some("from-cookie")
        );

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(
            extract_session_token(&headers, "token").as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_extract_token_ignores_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("tokenx=1; token="));
        assert_eq!(extract_session_token(&headers, "token"), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_session_token(&headers, "token"), None);

        assert_eq!(extract_session_token(&HeaderMap::new(), "token"), None);
    }
}
