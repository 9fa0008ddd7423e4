// ============================
// crates/backend-lib/tests/auth_flow.rs
// ============================
//! HTTP-level login, lockout and session flows.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::*;
use ems_backend_lib::storage::AccountStore;
use ems_common::{ErrorResponse, LoginResponse, MessageResponse, Role, SessionStatus};
use std::time::Duration;
use tower::ServiceExt;

fn set_cookie(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_login_success_sets_cookie() {
    let env = setup_test_env().await;

    let response = env
        .app
        .clone()
        .oneshot(login_request(MANAGER, PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    let body: LoginResponse = json_body(response).await;
    assert!(body.login_status);
    assert_eq!(body.role, Role::Manager);
    assert!(cookie.starts_with(&format!("token={}; ", body.token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
}

#[tokio::test]
async fn test_employee_login_path_is_the_same_handler() {
    let env = setup_test_env().await;

    let mut request = login_request(MANAGER, PASSWORD);
    *request.uri_mut() = "/auth/employeelogin".parse().unwrap();
    let response = env.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: LoginResponse = json_body(response).await;
    assert!(body.login_status);
    assert_eq!(body.role, Role::Manager);

    // Failures through either path hit the same counters
    let mut request = login_request(ASSISTANT, "Wr0ng!Password");
    *request.uri_mut() = "/auth/employeelogin".parse().unwrap();
    let response = env.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let record = env.store.load(ASSISTANT).await.unwrap().unwrap();
    assert_eq!(record.failed_attempts, 1);
}

#[tokio::test]
async fn test_unknown_account_and_wrong_password_look_the_same() {
    let env = setup_test_env().await;

    let wrong = env
        .app
        .clone()
        .oneshot(login_request(MANAGER, "Wr0ng!Password"))
        .await
        .unwrap();
    let unknown = env
        .app
        .clone()
        .oneshot(login_request("nobody@example.com", "Wr0ng!Password"))
        .await
        .unwrap();

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let wrong: ErrorResponse = json_body(wrong).await;
    let unknown: ErrorResponse = json_body(unknown).await;
    assert_eq!(wrong, unknown);
    assert_eq!(wrong.error.code, "AUTH_001");

    // Unknown identifiers never create a record
    assert!(env.store.load("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_lockout_and_lazy_unlock() {
    let env = setup_test_env().await;

    for _ in 0..2 {
        let response = env
            .app
            .clone()
            .oneshot(login_request(ASSISTANT, "Wr0ng!Password"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The third failure locks the account
    let response = env
        .app
        .clone()
        .oneshot(login_request(ASSISTANT, "Wr0ng!Password"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "AUTH_003");
    assert!(body.error.message.contains("1 minute"));

    // Locked: even the right password is refused, with the remaining wait
    env.clock.advance(Duration::from_secs(30));
    let response = env
        .app
        .clone()
        .oneshot(login_request(ASSISTANT, PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "AUTH_002");
    assert!(body.error.message.contains("30 seconds"));

    // The other account is unaffected
    let response = env
        .app
        .clone()
        .oneshot(login_request(MANAGER, PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Once the window has passed the right password gets in and resets state
    env.clock.advance(Duration::from_secs(31));
    let response = env
        .app
        .clone()
        .oneshot(login_request(ASSISTANT, PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = env.store.load(ASSISTANT).await.unwrap().unwrap();
    assert_eq!(record.failed_attempts, 0);
    assert!(record.lock_until.is_none());
}

#[tokio::test]
async fn test_malformed_login_is_bad_request() {
    let env = setup_test_env().await;

    let response = env
        .app
        .clone()
        .oneshot(login_request(MANAGER, ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = env
        .app
        .clone()
        .oneshot(login_request("", PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = env
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\":"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "VAL_001");

    // Validation failures are not login attempts
    let record = env.store.load(MANAGER).await.unwrap().unwrap();
    assert_eq!(record.failed_attempts, 0);
}

#[tokio::test]
async fn test_session_check_and_logout() {
    let env = setup_test_env().await;

    let anonymous: SessionStatus = json_body(
        env.app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/check-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(anonymous, SessionStatus::anonymous());

    let login: LoginResponse = json_body(
        env.app
            .clone()
            .oneshot(login_request(MANAGER, PASSWORD))
            .await
            .unwrap(),
    )
    .await;

    let status: SessionStatus = json_body(
        env.app
            .clone()
            .oneshot(get_with_cookie("/auth/check-session", &login.token))
            .await
            .unwrap(),
    )
    .await;
    assert!(status.is_authenticated);
    let user = status.user.unwrap();
    assert_eq!(user.identifier, MANAGER);
    assert_eq!(user.role, Role::Manager);

    let logout = env
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::COOKIE, format!("token={}", login.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(set_cookie(&logout).contains("Max-Age=0"));
    let message: MessageResponse = json_body(logout).await;
    assert_eq!(message.message, "Logged out successfully");

    // The token is dead even if a client kept it
    let status: SessionStatus = json_body(
        env.app
            .clone()
            .oneshot(get_with_cookie("/auth/check-session", &login.token))
            .await
            .unwrap(),
    )
    .await;
    assert!(!status.is_authenticated);
}

#[tokio::test]
async fn test_logout_without_session_still_clears_cookie() {
    let env = setup_test_env().await;

    let response = env
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).starts_with("token=;"));
}

#[tokio::test]
async fn test_protected_route() {
    let env = setup_test_env().await;

    let response = env
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/protected")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "AUTH_004");

    let login: LoginResponse = json_body(
        env.app
            .clone()
            .oneshot(login_request(ASSISTANT, PASSWORD))
            .await
            .unwrap(),
    )
    .await;

    let response = env
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/protected")
                .header(header::AUTHORIZATION, format!("Bearer {}", login.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: MessageResponse = json_body(response).await;
    assert_eq!(body.message, "Hello Sales Assistant, you have access!");
}

#[tokio::test]
async fn test_session_expires() {
    let env = setup_test_env().await;

    let login: LoginResponse = json_body(
        env.app
            .clone()
            .oneshot(login_request(MANAGER, PASSWORD))
            .await
            .unwrap(),
    )
    .await;

    env.clock
        .advance(env.state.sessions.ttl() + Duration::from_secs(1));

    let response = env
        .app
        .clone()
        .oneshot(get_with_cookie("/protected", &login.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_events_are_published() {
    let env = setup_test_env().await;
    let mut events = env.state.subscribe_logins();

    let response = env
        .app
        .clone()
        .oneshot(login_request(MANAGER, "Wr0ng!Password"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(events.try_recv().is_err());

    let response = env
        .app
        .clone()
        .oneshot(login_request(MANAGER, PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let event = events.try_recv().unwrap();
    assert_eq!(event.identifier, MANAGER);
    assert_eq!(event.role, Role::Manager);
}
