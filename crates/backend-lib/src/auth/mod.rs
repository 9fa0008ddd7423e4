// ============================
// ems-backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod guard;
pub mod password;
pub mod session;

pub use guard::{
    describe_wait, LockoutPolicy, LoginEvent, LoginGuard, LoginOutcome, GuardError, Rejection,
    DEFAULT_LOCK_DURATION, DEFAULT_LOCK_THRESHOLD,
};
pub use password::{
    hash_password, hash_password_secure, hash_password_with_params, validate_password_strength,
    verify_password, HashParams, PasswordRequirements, MIN_PASSWORD_LENGTH,
};
pub use session::{
    IssuedSession, JwtSessionIssuer, SessionClaims, SessionError, SessionIssuer, SESSION_TTL,
};
