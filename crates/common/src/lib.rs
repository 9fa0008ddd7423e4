// ================
// common/src/lib.rs
// ================
//! Common types shared between the employee-management frontend and the
//! authentication backend. These are the JSON bodies of the `/auth/*` routes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability tag carried by every account and every session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Showroom manager: assigns tasks, approves leave, enters KPIs
    #[serde(rename = "Showroom Manager", alias = "manager")]
    Manager,
    /// Sales assistant: works the tasks assigned by a manager
    #[serde(rename = "Sales Assistant", alias = "assistant")]
    Assistant,
}

impl Role {
    /// Name as stored and sent over the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "Showroom Manager",
            Role::Assistant => "Sales Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role `{}` (expected manager or assistant)", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" | "showroom manager" => Ok(Role::Manager),
            "assistant" | "sales assistant" => Ok(Role::Assistant),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Body of `POST /auth/login`
#[derive(Deserialize, Serialize, Clone)]
pub struct LoginRequest {
    /// Account identifier (the employee's email)
    pub email: String,
    /// Plain-text password, only ever held long enough to verify it
    pub password: String,
}

// Never print the password.
impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Successful login reply
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Always `true`; kept for the frontend which checks it
    pub login_status: bool,
    /// Role of the authenticated account
    pub role: Role,
    /// Signed session token (also set as an `HttpOnly` cookie)
    pub token: String,
}

/// Identity carried by a valid session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub identifier: String,
    pub role: Role,
    /// Expiry as seconds since the Unix epoch
    pub expires_at: i64,
}

/// Reply of `GET /auth/check-session`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

impl SessionStatus {
    pub fn anonymous() -> Self {
        Self {
            is_authenticated: false,
            user: None,
        }
    }

    pub fn authenticated(user: SessionUser) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
        }
    }
}

/// Plain informational reply (`/auth/logout`, `/protected`)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error details inside [`ErrorResponse`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    /// Stable machine-readable code such as `AUTH_001`
    pub code: String,
    pub message: String,
}

/// Body of every non-2xx reply
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}
