//! In-memory account store.
use super::{AccountRecord, AccountStore, LockCounters, StoreError};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

/// Account store backed by a sharded concurrent map.
///
/// Each compare-and-update runs while holding the shard guard for that key,
/// so attempts on one account serialize and attempts on different accounts
/// do not contend.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    accounts: Arc<DashMap<String, AccountRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn load(&self, identifier: &str) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.accounts.get(identifier).map(|entry| entry.clone()))
    }

    async fn compare_and_update_counters(
        &self,
        identifier: &str,
        expected: &LockCounters,
        next: &LockCounters,
    ) -> Result<bool, StoreError> {
        let Some(mut entry) = self.accounts.get_mut(identifier) else {
            return Ok(false);
        };
        if entry.counters() != *expected {
            return Ok(false);
        }
        entry.set_counters(next);
        Ok(true)
    }

    async fn reset_counters(&self, identifier: &str) -> Result<bool, StoreError> {
        let Some(mut entry) = self.accounts.get_mut(identifier) else {
            return Ok(false);
        };
        entry.set_counters(&LockCounters::default());
        Ok(true)
    }

    async fn insert(&self, record: AccountRecord) -> Result<(), StoreError> {
        match self.accounts.entry(record.identifier.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(record.identifier)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            },
        }
    }

    async fn update_secret_hash(
        &self,
        identifier: &str,
        secret_hash: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut entry) = self.accounts.get_mut(identifier) else {
            return Ok(false);
        };
        entry.secret_hash = secret_hash.to_string();
        entry.set_counters(&LockCounters::default());
        Ok(true)
    }
}
