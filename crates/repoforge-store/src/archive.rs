//! Directory packing into gzip-compressed tar archives.
//!
//! Entries are written in sorted path order with zeroed timestamps and
//! ownership so that packing identical trees yields identical archives.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

/// File extension appended to packed directories.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Archive path for `directory`: a sibling file named `<dir>.tar.gz`.
pub fn archive_path_for(directory: &Path) -> StorageResult<PathBuf> {
    let name = directory
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::PackFailed {
            path: directory.to_path_buf(),
            reason: "directory has no usable file name".to_string(),
        })?;
    Ok(directory.with_file_name(format!("{name}.{ARCHIVE_EXTENSION}")))
}

/// Pack `directory` into `<directory>.tar.gz` and return the archive path.
///
/// Blocking; call from `spawn_blocking` in async contexts.
pub fn pack_directory(directory: &Path) -> StorageResult<PathBuf> {
    if !directory.is_dir() {
        return Err(StorageError::PackFailed {
            path: directory.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    let archive_path = archive_path_for(directory)?;

    let file = File::create(&archive_path)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    for entry in sorted_entries(directory)? {
        let rel = entry
            .strip_prefix(directory)
            .map_err(|_| StorageError::PackFailed {
                path: entry.clone(),
                reason: "entry escapes packed directory".to_string(),
            })?;

        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if entry.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder.append_data(&mut header, rel, std::io::empty())?;
        } else {
            let metadata = fs::metadata(&entry)?;
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(metadata.len());
            builder.append_data(&mut header, rel, File::open(&entry)?)?;
        }
    }

    builder.into_inner()?.finish()?;
    tracing::debug!(archive = %archive_path.display(), "packed directory");
    Ok(archive_path)
}

/// Recursively list `dir` (directories before their contents), sorted by name.
fn sorted_entries(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    children.sort();

    let mut entries = Vec::new();
    for child in children {
        let is_dir = child.is_dir();
        entries.push(child.clone());
        if is_dir {
            entries.extend(sorted_entries(&child)?);
        }
    }
    Ok(entries)
}
