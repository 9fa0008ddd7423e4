// ============================
// ems-backend-lib/src/storage/mod.rs
// ============================
//! Account store abstraction with in-memory and flat-file implementations.
//!
//! The login guard never issues a blind write: every change to the lockout
//! counters goes through [`AccountStore::compare_and_update_counters`], which
//! only writes when the stored counters still equal the ones the caller read.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ems_common::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod flat_file;
mod memory;

pub use flat_file::FlatFileAccountStore;
pub use memory::MemoryAccountStore;

/// Failures of the storage backend itself
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt account record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("account already exists: {0}")]
    AlreadyExists(String),
}

/// The part of an account the lockout guard reads and writes atomically
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockCounters {
    /// Consecutive failed logins since the last reset
    pub failed_attempts: u32,
    /// End of the current lock window, if one was set
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockCounters {
    pub fn is_clear(&self) -> bool {
        self.failed_attempts == 0 && self.lock_until.is_none()
    }
}

/// Security record of one account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Unique natural key (email)
    pub identifier: String,
    /// PHC-format password hash
    pub secret_hash: String,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default)]
    pub lock_until: Option<DateTime<Utc>>,
    pub role: Role,
}

impl AccountRecord {
    /// A fresh, unlocked record
    pub fn new(identifier: impl Into<String>, secret_hash: impl Into<String>, role: Role) -> Self {
        Self {
            identifier: identifier.into(),
            secret_hash: secret_hash.into(),
            failed_attempts: 0,
            lock_until: None,
            role,
        }
    }

    pub fn counters(&self) -> LockCounters {
        LockCounters {
            failed_attempts: self.failed_attempts,
            lock_until: self.lock_until,
        }
    }

    pub fn set_counters(&mut self, counters: &LockCounters) {
        self.failed_attempts = counters.failed_attempts;
        self.lock_until = counters.lock_until;
    }
}

// The hash stays out of logs.
impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("identifier", &self.identifier)
            .field("secret_hash", &"[redacted]")
            .field("failed_attempts", &self.failed_attempts)
            .field("lock_until", &self.lock_until)
            .field("role", &self.role)
            .finish()
    }
}

/// Trait for account storage backends
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load an account by identifier. `Ok(None)` when it does not exist.
    async fn load(&self, identifier: &str) -> Result<Option<AccountRecord>, StoreError>;

    /// Replace the lockout counters with `next` if and only if they currently
    /// equal `expected`. Returns `false` when they did not match (or the
    /// account vanished); nothing is written in that case.
    async fn compare_and_update_counters(
        &self,
        identifier: &str,
        expected: &LockCounters,
        next: &LockCounters,
    ) -> Result<bool, StoreError>;

    /// Unconditionally clear the lockout counters. Returns `false` when the
    /// account does not exist.
    async fn reset_counters(&self, identifier: &str) -> Result<bool, StoreError>;

    /// Create a new account. Fails with [`StoreError::AlreadyExists`] when the
    /// identifier is taken.
    async fn insert(&self, record: AccountRecord) -> Result<(), StoreError>;

    /// Replace the password hash and clear the lockout counters. Returns
    /// `false` when the account does not exist.
    async fn update_secret_hash(
        &self,
        identifier: &str,
        secret_hash: &str,
    ) -> Result<bool, StoreError>;
}
