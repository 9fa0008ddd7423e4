// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use crate::auth::{describe_wait, guard::wait_secs, GuardError, Rejection, SessionError};
use crate::validation::ValidationError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ems_common::{ErrorDetail, ErrorResponse};
use std::time::Duration;
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown account or wrong password; the two are never told apart
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account locked. Try again in {}", describe_wait(*retry_after))]
    AccountLocked { retry_after: Duration },

    #[error("Too many failed attempts. Account locked for {}", describe_wait(*retry_after))]
    TooManyAttempts { retry_after: Duration },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Account store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountLocked { .. }
            | AppError::TooManyAttempts { .. }
            | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StorageUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::AccountLocked { .. } => "AUTH_002",
            AppError::TooManyAttempts { .. } => "AUTH_003",
            AppError::Unauthorized(_) => "AUTH_004",
            AppError::Forbidden => "AUTH_005",
            AppError::StorageUnavailable(_) => "STORE_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use.
    ///
    /// Lockout messages carry the remaining wait in both builds.
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::AccountLocked { .. } | AppError::TooManyAttempts { .. } => self.to_string(),
            AppError::Unauthorized(_) => "Authentication required".to_string(),
            AppError::Forbidden => "Forbidden".to_string(),
            AppError::StorageUnavailable(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
        }
    }

    /// Remaining lock time, for the `Retry-After` header
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::AccountLocked { retry_after } | AppError::TooManyAttempts { retry_after } => {
                Some(*retry_after)
            },
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(wait) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(wait_secs(wait)));
        }
        response
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::InvalidCredential => AppError::InvalidCredentials,
            Rejection::AccountLocked { retry_after } => AppError::AccountLocked { retry_after },
            Rejection::TooManyAttempts { retry_after } => AppError::TooManyAttempts { retry_after },
        }
    }
}

impl From<GuardError> for AppError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::StorageUnavailable(e) => AppError::StorageUnavailable(e.to_string()),
            GuardError::Session(e) => AppError::Internal(e.to_string()),
            e @ (GuardError::LockWindowOutOfRange(_) | GuardError::Verification(_)) => {
                AppError::Internal(e.to_string())
            },
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Expired => AppError::Unauthorized("Token expired".to_string()),
            SessionError::Revoked | SessionError::Invalid => {
                AppError::Unauthorized("Invalid token".to_string())
            },
            SessionError::Signing(msg) => AppError::Internal(msg),
            e @ SessionError::LifetimeOutOfRange(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
