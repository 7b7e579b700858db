//! Per-package-system generate, pack and publish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use repoforge_store::ObjectStore;
use repoforge_tools::{GenerateRequest, MetadataGenerator, SigningContext};

use crate::checksum::file_digest;
use crate::domain::{GeneratedArtifact, PipelineError, RepositoryDefinition, Result};
use crate::keys::artifact_key;
use crate::metrics::METRICS;
use crate::obs;
use crate::workspace::Workspace;

/// Builds and uploads one repository archive per package system.
#[derive(Clone)]
pub struct RepositoryBuilder {
    store: Arc<dyn ObjectStore>,
    generator: Arc<dyn MetadataGenerator>,
}

impl RepositoryBuilder {
    pub fn new(store: Arc<dyn ObjectStore>, generator: Arc<dyn MetadataGenerator>) -> Self {
        Self { store, generator }
    }

    /// Build every package system in `document`, concurrently.
    ///
    /// The first failure fails the whole call; archives already uploaded for
    /// other systems stay in the store.
    pub async fn build_and_publish(
        &self,
        account: &str,
        workspace: &Workspace,
        document: &RepositoryDefinition,
        signing: Option<SigningContext<'_>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<GeneratedArtifact>> {
        tokio::fs::create_dir_all(workspace.packages_dir()).await?;

        let builds: Vec<_> = document
            .systems()
            .map(|system| self.build_system(account, system, workspace, document, signing, now))
            .collect();
        try_join_all(builds).await
    }

    async fn build_system(
        &self,
        account: &str,
        package_system: &str,
        workspace: &Workspace,
        document: &RepositoryDefinition,
        signing: Option<SigningContext<'_>>,
        now: DateTime<Utc>,
    ) -> Result<GeneratedArtifact> {
        let output_dir = workspace.output_dir(package_system);
        match tokio::fs::remove_dir_all(&output_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&output_dir).await?;

        let slice = document.slice(package_system)?;
        let packages_dir = workspace.packages_dir();
        self.generator
            .generate(GenerateRequest {
                package_system,
                slice: &slice,
                packages_dir: &packages_dir,
                output_dir: &output_dir,
                signing,
            })
            .await
            .map_err(|source| PipelineError::Generation {
                package_system: package_system.to_string(),
                source,
            })?;

        let archive = self.store.pack(&output_dir).await?;
        let archive_name = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{package_system}.{}", repoforge_store::ARCHIVE_EXTENSION));
        let key = artifact_key(account, package_system, now.timestamp(), &archive_name);

        let digest = file_digest(&archive).await?;
        self.store.put(&key, &archive).await?;
        tokio::fs::remove_file(&archive).await?;

        obs::emit_artifact_published(package_system, &key, digest.size);
        METRICS.inc_artifacts_published();
        Ok(GeneratedArtifact {
            package_system: package_system.to_string(),
            key,
            generated_at: now,
            sha256: digest.sha256,
            size: digest.size,
        })
    }
}
