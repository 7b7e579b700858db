//! Fetch-or-create and persist an account's repository definition.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repoforge_store::ObjectStore;
use serde::de::Error as _;

use crate::domain::job::is_safe_segment;
use crate::domain::{PipelineError, RepositoryDefinition, Result};
use crate::keys::config_key;
use crate::obs;
use crate::workspace::Workspace;

/// Moves repository definitions between the object store and a workspace.
#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<dyn ObjectStore>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Place the account's definition at the workspace's definition path.
    ///
    /// Any failure to fetch (missing, unreachable) falls back to a fresh `{}`
    /// document. Only local write errors fail.
    pub async fn fetch(&self, account: &str, workspace: &Workspace) -> Result<PathBuf> {
        let key = config_key(account);
        let dest = workspace.definition_path();
        match self.store.get(&key).await {
            Ok(object) => {
                object.move_to(&dest).await?;
                tracing::debug!(key = %key, "fetched repository definition");
            }
            Err(e) => {
                obs::emit_definition_fallback(account, &key, &e);
                tokio::fs::write(&dest, b"{}").await?;
            }
        }
        Ok(dest)
    }

    /// Parse a local definition.
    ///
    /// Unparseable content, or a package system that is not a single safe
    /// path segment, is `DocumentCorrupt`.
    pub async fn load(&self, path: &Path) -> Result<RepositoryDefinition> {
        let bytes = tokio::fs::read(path).await?;
        let corrupt = |source| PipelineError::DocumentCorrupt {
            path: path.to_path_buf(),
            source,
        };
        let document: RepositoryDefinition = serde_json::from_slice(&bytes).map_err(corrupt)?;
        if let Some(system) = document.systems().find(|system| !is_safe_segment(system)) {
            return Err(corrupt(serde_json::Error::custom(format!(
                "package system {system:?} is not a valid directory name"
            ))));
        }
        Ok(document)
    }

    /// Write a definition to disk, pretty printed.
    pub async fn write(&self, path: &Path, document: &RepositoryDefinition) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(document)?;
        bytes.push(b'\n');
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Upload the local definition to its canonical key, then delete it.
    pub async fn persist(&self, account: &str, path: &Path) -> Result<String> {
        let key = config_key(account);
        self.store.put(&key, path).await?;
        tokio::fs::remove_file(path).await?;
        Ok(key)
    }
}
