//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryObjectStore`, which satisfies the `ObjectStore` contract
//! without touching a real backend and supports failure injection.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::{NamedTempFile, TempDir};

use crate::archive::pack_directory;
use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory object store backed by a `BTreeMap<key, bytes>`.
///
/// Fetched objects are materialized in a private scratch directory that lives
/// as long as the store.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    put_log: Mutex<Vec<String>>,
    failing_gets: Mutex<HashSet<String>>,
    failing_put_prefixes: Mutex<Vec<String>>,
    fail_pack: AtomicBool,
    scratch: TempDir,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            put_log: Mutex::new(Vec::new()),
            failing_gets: Mutex::new(HashSet::new()),
            failing_put_prefixes: Mutex::new(Vec::new()),
            fail_pack: AtomicBool::new(false),
            scratch: tempfile::tempdir().expect("create scratch dir for MemoryObjectStore"),
        }
    }

    /// Seed an object directly, bypassing `put`.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.into());
    }

    /// Bytes stored under `key`, if any.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Keys passed to `put`, in call order.
    pub fn put_keys(&self) -> Vec<String> {
        self.put_log.lock().unwrap().clone()
    }

    /// Make `get(key)` fail with `StorageError::Unavailable`.
    pub fn fail_get(&self, key: &str) {
        self.failing_gets.lock().unwrap().insert(key.to_string());
    }

    /// Make every `put` whose key starts with `prefix` fail.
    pub fn fail_put_with_prefix(&self, prefix: &str) {
        self.failing_put_prefixes
            .lock()
            .unwrap()
            .push(prefix.to_string());
    }

    /// Make every `pack` call fail.
    pub fn fail_pack(&self) {
        self.fail_pack.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> StorageResult<LocalObject> {
        validate_key(key)?;
        if self.failing_gets.lock().unwrap().contains(key) {
            return Err(StorageError::Unavailable {
                key: key.to_string(),
                reason: "injected get failure".to_string(),
            });
        }
        let data = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;

        let mut tmp = NamedTempFile::new_in(self.scratch.path())?;
        tmp.write_all(&data)?;
        Ok(LocalObject::new(key, tmp.into_temp_path()))
    }

    async fn put(&self, key: &str, source: &Path) -> StorageResult<()> {
        validate_key(key)?;
        self.put_log.lock().unwrap().push(key.to_string());
        let failing = self
            .failing_put_prefixes
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()));
        if failing {
            return Err(StorageError::UploadFailed {
                key: key.to_string(),
                reason: "injected put failure".to_string(),
            });
        }
        let data = tokio::fs::read(source).await?;
        self.insert(key, data);
        Ok(())
    }

    async fn pack(&self, directory: &Path) -> StorageResult<PathBuf> {
        if self.fail_pack.load(Ordering::SeqCst) {
            return Err(StorageError::PackFailed {
                path: directory.to_path_buf(),
                reason: "injected pack failure".to_string(),
            });
        }
        let directory = directory.to_path_buf();
        tokio::task::spawn_blocking(move || pack_directory(&directory)).await?
    }
}
