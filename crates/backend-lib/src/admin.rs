// ============================
// ems-backend-lib/src/admin.rs
// ============================
//! Operator tasks: create accounts, set passwords, lift locks.
//!
//! These bypass the login guard on purpose and are only reachable from the
//! command line, never over HTTP.
use crate::auth::{
    hash_password_with_params, validate_password_strength, HashParams, PasswordRequirements,
};
use crate::storage::{AccountRecord, AccountStore, StoreError};
use crate::validation::{validate_email, ValidationError};
use ems_common::Role;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("password must be at least {} characters and mix upper and lower case letters, digits and symbols", PasswordRequirements::default().min_length)]
    WeakPassword,

    #[error("no account for {0}")]
    NotFound(String),

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn hash_new_password(password: &SecretString, params: HashParams) -> Result<String, AdminError> {
    if !validate_password_strength(password.expose_secret(), &PasswordRequirements::default()) {
        return Err(AdminError::WeakPassword);
    }
    hash_password_with_params(password.expose_secret(), params)
        .map_err(|e| AdminError::Hash(e.to_string()))
}

/// Create an account with clear lockout counters
pub async fn provision_account(
    store: &dyn AccountStore,
    email: &str,
    role: Role,
    password: &SecretString,
    params: HashParams,
) -> Result<AccountRecord, AdminError> {
    validate_email(email)?;
    let hash = hash_new_password(password, params)?;

    let record = AccountRecord::new(email, hash, role);
    store.insert(record.clone()).await?;
    info!(identifier = email, %role, "account created");
    Ok(record)
}

/// Replace an account's password. Also lifts any lock.
pub async fn reset_password(
    store: &dyn AccountStore,
    email: &str,
    password: &SecretString,
    params: HashParams,
) -> Result<(), AdminError> {
    let hash = hash_new_password(password, params)?;
    if !store.update_secret_hash(email, &hash).await? {
        return Err(AdminError::NotFound(email.to_string()));
    }
    info!(identifier = email, "password reset");
    Ok(())
}

/// Clear an account's failure count and lock
pub async fn unlock(store: &dyn AccountStore, email: &str) -> Result<(), AdminError> {
    if !store.reset_counters(email).await? {
        return Err(AdminError::NotFound(email.to_string()));
    }
    info!(identifier = email, "account unlocked");
    Ok(())
}
