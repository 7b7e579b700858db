//! Repoforge-Store: object store layer for repoforge
//!
//! This crate owns every byte that crosses the object-store boundary:
//! fetching package blobs and repository definitions, uploading generated
//! artifacts, and packing generated repository trees into archives.
//!
//! ## Layer 0 - Data/Persistence
//!
//! ## Key Components
//!
//! - `ObjectStore`: async get/put/pack over string keys
//! - `LocalObject`: owned temporary file produced by `get`
//! - `FsObjectStore`: directory-backed store
//! - `fakes::MemoryObjectStore`: in-memory store with failure injection

pub mod archive;
mod error;
pub mod fakes;
mod fs_store;
pub mod storage_traits;

pub use archive::{archive_path_for, pack_directory, ARCHIVE_EXTENSION};
pub use error::StorageError;
pub use fs_store::FsObjectStore;
pub use storage_traits::{validate_key, LocalObject, ObjectStore, StorageResult};
