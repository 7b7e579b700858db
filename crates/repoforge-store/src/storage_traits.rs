//! Storage trait definitions for repoforge
//!
//! - `ObjectStore`: keyed blob storage (get/put/pack)
//! - `LocalObject`: owned local copy of a fetched object
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempPath;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Validate an object key.
///
/// Keys are `/`-separated relative paths: non-empty, not absolute, with no
/// empty, `.` or `..` segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// LocalObject: fetched object on local disk
// ---------------------------------------------------------------------------

/// A fetched object materialized as a temporary local file.
///
/// The handle owns the file: dropping it deletes the file, and
/// [`LocalObject::move_to`] transfers ownership of the bytes to a new path.
#[derive(Debug)]
pub struct LocalObject {
    key: String,
    path: TempPath,
}

impl LocalObject {
    pub fn new(key: impl Into<String>, path: TempPath) -> Self {
        Self {
            key: key.into(),
            path,
        }
    }

    /// Key the object was fetched from.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current location of the local file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the file to `dest`, creating parent directories as needed.
    ///
    /// Uses a rename; when source and destination live on different
    /// filesystems the bytes are copied and the temporary file removed.
    pub async fn move_to(self, dest: &Path) -> StorageResult<PathBuf> {
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || -> StorageResult<PathBuf> {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match self.path.persist(&dest) {
                Ok(()) => Ok(dest),
                Err(err) => {
                    // `err.path` still owns the temp file and deletes it on drop.
                    tracing::debug!(
                        key = %self.key,
                        error = %err.error,
                        "rename failed, copying across filesystems"
                    );
                    std::fs::copy(&err.path, &dest)?;
                    Ok(dest)
                }
            }
        })
        .await?
    }
}

// ---------------------------------------------------------------------------
// ObjectStore: keyed blob storage
// ---------------------------------------------------------------------------

/// Keyed object store.
///
/// Guarantees:
/// - `get(key)` yields the exact bytes last `put` under `key`, or
///   `StorageError::NotFound` when nothing was stored.
/// - `put` replaces any previous object under the same key (last write wins).
/// - `pack(dir)` produces a single local archive of `dir` without modifying it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object into a local temporary file.
    async fn get(&self, key: &str) -> StorageResult<LocalObject>;

    /// Upload the local file at `source` under `key`.
    async fn put(&self, key: &str, source: &Path) -> StorageResult<()>;

    /// Pack `directory` into a local archive and return its path.
    async fn pack(&self, directory: &Path) -> StorageResult<PathBuf>;
}
