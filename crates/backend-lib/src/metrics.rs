// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_ACCEPTED: &str = "auth.login.accepted";
/// Labelled with `reason` = `invalid_credential` | `account_locked` | `too_many_attempts`
pub const LOGIN_REJECTED: &str = "auth.login.rejected";
pub const LOGIN_STORAGE_ERROR: &str = "auth.login.storage_error";
/// Compare-and-update lost to a concurrent attempt and was re-evaluated
pub const LOGIN_CAS_RETRY: &str = "auth.login.cas_retry";
pub const SESSION_ISSUED: &str = "auth.session.issued";
pub const SESSION_REVOKED: &str = "auth.session.revoked";
