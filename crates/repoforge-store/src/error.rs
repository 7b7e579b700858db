//! Error types for repoforge-store

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the object store layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object exists under the key
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// The store could not be reached or refused the request
    #[error("Object store unavailable for {key}: {reason}")]
    Unavailable { key: String, reason: String },

    /// Key is empty, absolute, or contains `..`/empty segments
    #[error("Invalid object key: {key}")]
    InvalidKey { key: String },

    /// Upload rejected by the store
    #[error("Upload failed for {key}: {reason}")]
    UploadFailed { key: String, reason: String },

    /// Packing a directory into an archive failed
    #[error("Pack failed for {path}: {reason}")]
    PackFailed { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Io(std::io::Error::other(err.to_string()))
    }
}
