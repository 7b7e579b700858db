//! Published artifacts and the result attached to a finished job.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A packed repository uploaded to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub package_system: String,
    pub key: String,
    pub generated_at: DateTime<Utc>,
    /// Hex SHA-256 of the uploaded archive.
    pub sha256: String,
    pub size: u64,
}

/// Fields the pipeline attaches to a successful job for the downstream
/// publishing stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Package system -> artifact key.
    pub generated: BTreeMap<String, String>,

    /// Canonical repository path -> original package reference.
    pub package_assets: BTreeMap<String, String>,

    /// Key of the persisted repository definition.
    pub config: String,

    #[serde(default)]
    pub artifacts: Vec<GeneratedArtifact>,
}

impl JobResult {
    pub fn new(
        artifacts: Vec<GeneratedArtifact>,
        package_assets: BTreeMap<String, String>,
        config: String,
    ) -> Self {
        let generated = artifacts
            .iter()
            .map(|artifact| (artifact.package_system.clone(), artifact.key.clone()))
            .collect();
        Self {
            generated,
            package_assets,
            config,
            artifacts,
        }
    }
}
