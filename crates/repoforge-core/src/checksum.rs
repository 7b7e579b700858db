//! SHA-256 digests of staged packages and archives.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex SHA-256 and size of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub sha256: String,
    pub size: u64,
}

/// Hash a file without blocking the runtime.
pub async fn file_digest(path: &Path) -> io::Result<FileDigest> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> io::Result<FileDigest> {
        let mut file = File::open(&path)?;
        let mut hasher = Sha256::new();
        let size = io::copy(&mut file, &mut hasher)?;
        Ok(FileDigest {
            sha256: hex::encode(hasher.finalize()),
            size,
        })
    })
    .await
    .map_err(io::Error::other)?
}
