//! The repository definition document.
//!
//! One JSON object per account, `package-system -> [entry]`, describing every
//! package the account's repositories contain. Metadata generators consume
//! one package system's slice at a time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One package in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub origin: String,
    pub codename: String,
    /// `stable` or `unstable` for entries written by repoforge.
    pub component: String,
    /// Canonical repository-relative pool path.
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Fields written by other tools are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageEntry {
    /// Basename of the pool path.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// `package-system -> [entry]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryDefinition(BTreeMap<String, Vec<PackageEntry>>);

impl RepositoryDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to a package system's slice.
    ///
    /// An entry already published at the same origin, codename and path is
    /// replaced in place; fields written by other tools are kept unless the
    /// new entry sets them. Returns `true` when an entry was replaced.
    pub fn add(&mut self, package_system: &str, mut entry: PackageEntry) -> bool {
        let entries = self.0.entry(package_system.to_string()).or_default();
        let existing = entries.iter_mut().find(|current| {
            current.origin == entry.origin
                && current.codename == entry.codename
                && current.path == entry.path
        });
        match existing {
            Some(current) => {
                let mut extra = std::mem::take(&mut current.extra);
                extra.append(&mut entry.extra);
                entry.extra = extra;
                *current = entry;
                true
            }
            None => {
                entries.push(entry);
                false
            }
        }
    }

    /// Remove every entry, in any package system, for `basename` published by
    /// `origin` under `codename`. Returns the number of entries removed.
    ///
    /// Emptied package systems stay in the document so their repositories are
    /// regenerated without the package.
    pub fn remove_matching(&mut self, origin: &str, codename: &str, basename: &str) -> usize {
        let mut removed = 0;
        for entries in self.0.values_mut() {
            let before = entries.len();
            entries.retain(|entry| {
                !(entry.origin == origin
                    && entry.codename == codename
                    && entry.basename() == basename)
            });
            removed += before - entries.len();
        }
        removed
    }

    /// Package systems, sorted.
    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn entries(&self, package_system: &str) -> &[PackageEntry] {
        self.0
            .get(package_system)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// One package system's entries as the JSON handed to generators.
    pub fn slice(&self, package_system: &str) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.entries(package_system))
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
