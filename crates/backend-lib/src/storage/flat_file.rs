//! Flat-file account store: one pretty-printed JSON file per account.
use super::{AccountRecord, AccountStore, LockCounters, StoreError};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, sync::Mutex};

/// Flat-file implementation of the [`AccountStore`] trait.
///
/// Files live under `<root>/accounts/<base64url(identifier)>.json`. Writes go
/// to a temporary file first and are renamed into place, so readers never see
/// a torn record. Every read-compare-write for one identifier holds that
/// identifier's mutex; other identifiers are unaffected.
#[derive(Clone)]
pub struct FlatFileAccountStore {
    root: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FlatFileAccountStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("accounts"))?;
        Ok(Self {
            root,
            locks: Arc::new(DashMap::new()),
        })
    }

    fn account_path(&self, identifier: &str) -> PathBuf {
        let file_name = format!("{}.json", URL_SAFE_NO_PAD.encode(identifier.as_bytes()));
        self.root.join("accounts").join(file_name)
    }

    fn lock_for(&self, identifier: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_record(&self, identifier: &str) -> Result<Option<AccountRecord>, StoreError> {
        let path = self.account_path(identifier);
        let content = match tokio_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: AccountRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    async fn write_record(&self, record: &AccountRecord) -> Result<(), StoreError> {
        let path = self.account_path(&record.identifier);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(record)?;
        tokio_fs::write(&tmp, json).await?;
        if let Err(e) = tokio_fs::rename(&tmp, &path).await {
            // Best effort; the rename error is the one worth reporting
            let _ = tokio_fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FlatFileAccountStore {
    async fn load(&self, identifier: &str) -> Result<Option<AccountRecord>, StoreError> {
        self.read_record(identifier).await
    }

    async fn compare_and_update_counters(
        &self,
        identifier: &str,
        expected: &LockCounters,
        next: &LockCounters,
    ) -> Result<bool, StoreError> {
        let lock = self.lock_for(identifier);
        let _guard = lock.lock().await;

        let Some(mut record) = self.read_record(identifier).await? else {
            return Ok(false);
        };
        if record.counters() != *expected {
            return Ok(false);
        }
        record.set_counters(next);
        self.write_record(&record).await?;
        Ok(true)
    }

    async fn reset_counters(&self, identifier: &str) -> Result<bool, StoreError> {
        let lock = self.lock_for(identifier);
        let _guard = lock.lock().await;

        let Some(mut record) = self.read_record(identifier).await? else {
            return Ok(false);
        };
        record.set_counters(&LockCounters::default());
        self.write_record(&record).await?;
        Ok(true)
    }

    async fn insert(&self, record: AccountRecord) -> Result<(), StoreError> {
        let lock = self.lock_for(&record.identifier);
        let _guard = lock.lock().await;

        if self.read_record(&record.identifier).await?.is_some() {
            return Err(StoreError::AlreadyExists(record.identifier));
        }
        self.write_record(&record).await
    }

    async fn update_secret_hash(
        &self,
        identifier: &str,
        secret_hash: &str,
    ) -> Result<bool, StoreError> {
        let lock = self.lock_for(identifier);
        let _guard = lock.lock().await;

        let Some(mut record) = self.read_record(identifier).await? else {
            return Ok(false);
        };
        record.secret_hash = secret_hash.to_string();
        record.set_counters(&LockCounters::default());
        self.write_record(&record).await?;
        Ok(true)
    }
}
