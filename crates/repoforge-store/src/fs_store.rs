use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::archive::pack_directory;
use crate::error::StorageError;
use crate::storage_traits::{validate_key, LocalObject, ObjectStore, StorageResult};

/// Filesystem-backed object store.
///
/// Layout: `<root>/objects/<key>` for stored objects and `<root>/scratch/`
/// for fetched temporary copies.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    objects_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl FsObjectStore {
    /// Create a new `FsObjectStore` rooted at `root`. Creates the layout if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let objects_dir = root.as_ref().join("objects");
        let scratch_dir = root.as_ref().join("scratch");
        fs::create_dir_all(&objects_dir)?;
        fs::create_dir_all(&scratch_dir)?;
        Ok(Self {
            objects_dir,
            scratch_dir,
        })
    }

    /// On-disk location of the object stored under `key`.
    pub fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.objects_dir.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> StorageResult<LocalObject> {
        let source = self.object_path(key)?;
        let scratch = self.scratch_dir.clone();
        let key_owned = key.to_string();

        tokio::task::spawn_blocking(move || -> StorageResult<LocalObject> {
            let tmp = NamedTempFile::new_in(&scratch)?;
            fs::copy(&source, tmp.path()).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::NotFound {
                        key: key_owned.clone(),
                    }
                } else {
                    StorageError::Io(e)
                }
            })?;
            Ok(LocalObject::new(key_owned, tmp.into_temp_path()))
        })
        .await?
    }

    async fn put(&self, key: &str, source: &Path) -> StorageResult<()> {
        let dest = self.object_path(key)?;
        let source = source.to_path_buf();

        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let parent = dest.parent().unwrap_or(Path::new("."));
            fs::create_dir_all(parent)?;

            // Atomic write: copy into a temp file beside the target, then rename.
            let tmp = NamedTempFile::new_in(parent)?;
            fs::copy(&source, tmp.path())?;
            tmp.persist(&dest).map_err(|e| e.error)?;
            Ok(())
        })
        .await??;

        tracing::debug!(key = %key, "stored object");
        Ok(())
    }

    async fn pack(&self, directory: &Path) -> StorageResult<PathBuf> {
        let directory = directory.to_path_buf();
        tokio::task::spawn_blocking(move || pack_directory(&directory)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn source_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let (dir, store) = make_store();
        let src = source_file(dir.path(), "app.deb", b"deb bytes");

        store.put("pkgs/app.deb", &src).await.unwrap();
        let object = store.get("pkgs/app.deb").await.unwrap();

        assert_eq!(object.key(), "pkgs/app.deb");
        assert_eq!(fs::read(object.path()).unwrap(), b"deb bytes");
        // Source is left in place; put copies.
        assert!(src.exists());
    }

    #[tokio::test]
    async fn get_copies_into_scratch() {
        let (dir, store) = make_store();
        let src = source_file(dir.path(), "a", b"x");
        store.put("k/a", &src).await.unwrap();

        let object = store.get("k/a").await.unwrap();
        assert!(object.path().starts_with(dir.path().join("scratch")));
        assert!(store.object_path("k/a").unwrap().exists());
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let (dir, store) = make_store();
        let first = source_file(dir.path(), "first", b"one");
        let second = source_file(dir.path(), "second", b"two");

        store.put("repositories/default/repository.json", &first).await.unwrap();
        store.put("repositories/default/repository.json", &second).await.unwrap();

        let object = store.get("repositories/default/repository.json").await.unwrap();
        assert_eq!(fs::read(object.path()).unwrap(), b"two");
    }

    #[tokio::test]
    async fn get_nonexistent_returns_not_found() {
        let (_dir, store) = make_store();
        match store.get("no/such/object").await {
            Err(StorageError::NotFound { key }) => assert_eq!(key, "no/such/object"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_key_rejected_before_io() {
        let (dir, store) = make_store();
        let src = source_file(dir.path(), "a", b"x");
        let err = store.put("../escape", &src).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn pack_writes_sibling_archive() {
        let (dir, store) = make_store();
        let out = dir.path().join("generated").join("deb");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("Packages"), b"index").unwrap();

        let archive = store.pack(&out).await.unwrap();
        assert_eq!(archive, dir.path().join("generated").join("deb.tar.gz"));
        assert!(archive.exists());
    }
}
