//! Package ingestion: fetch, stage, classify, sign and fold into the definition.
//!
//! Downloads run concurrently (bounded), but the definition is only ever
//! mutated by the calling task, in job order, after every download succeeded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use repoforge_store::ObjectStore;
use repoforge_tools::SigningContext;

use crate::checksum::{file_digest, FileDigest};
use crate::classify::Classifier;
use crate::domain::{
    Job, PackageEntry, PackageRef, PipelineError, RepositoryDefinition, Result, ValidationError,
};
use crate::keys::canonical_path;
use crate::metrics::METRICS;
use crate::obs;
use crate::workspace::Workspace;

/// A package fetched into the workspace.
#[derive(Debug)]
struct StagedPackage {
    package_system: String,
    path: PathBuf,
    digest: FileDigest,
}

/// Stages a job's packages and records them in the repository definition.
#[derive(Clone)]
pub struct PackageIngestor {
    store: Arc<dyn ObjectStore>,
    classifier: Classifier,
    concurrency: usize,
}

impl PackageIngestor {
    pub fn new(store: Arc<dyn ObjectStore>, classifier: Classifier, concurrency: usize) -> Self {
        Self {
            store,
            classifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Drop every entry named by the job's remove set. Returns the number of
    /// entries removed.
    pub fn remove(&self, job: &Job, document: &mut RepositoryDefinition) -> usize {
        let mut requested = 0;
        let mut removed = 0;
        for listing in job.removals() {
            requested += 1;
            let count = document.remove_matching(
                listing.origin,
                listing.codename,
                listing.package.basename(),
            );
            if count == 0 {
                tracing::debug!(
                    origin = %listing.origin,
                    codename = %listing.codename,
                    package = %listing.package,
                    "removal matched no entries"
                );
            }
            removed += count;
        }
        if requested > 0 {
            obs::emit_packages_removed(requested, removed);
        }
        removed
    }

    /// Stage every added package and append one entry per listing.
    ///
    /// Returns `canonical path -> original package reference`. Staged files
    /// stay in the workspace for the metadata generators.
    pub async fn ingest(
        &self,
        job: &Job,
        workspace: &Workspace,
        document: &mut RepositoryDefinition,
        signing: Option<SigningContext<'_>>,
    ) -> Result<BTreeMap<String, String>> {
        // A reference listed under several codenames of one origin is staged once.
        let mut seen = HashSet::new();
        let downloads: Vec<(String, PackageRef)> = job
            .additions()
            .filter(|listing| seen.insert((listing.origin, listing.package)))
            .map(|listing| (listing.origin.to_string(), listing.package.clone()))
            .collect();

        let staged: Vec<StagedPackage> = stream::iter(downloads.clone())
            .map(|(origin, package)| async move {
                self.stage(&origin, &package, workspace, signing).await
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        let staged: HashMap<(String, PackageRef), StagedPackage> =
            downloads.into_iter().zip(staged).collect();

        let mut package_assets = BTreeMap::new();
        for listing in job.additions() {
            let key = (listing.origin.to_string(), listing.package.clone());
            let Some(package) = staged.get(&key) else {
                continue;
            };
            let basename = listing.package.basename();
            let component = self.classifier.classify(basename);
            let path = canonical_path(listing.origin, listing.codename, component, basename);

            let replaced = document.add(
                &package.package_system,
                PackageEntry {
                    origin: listing.origin.to_string(),
                    codename: listing.codename.to_string(),
                    component: component.to_string(),
                    path: path.clone(),
                    sha256: Some(package.digest.sha256.clone()),
                    size: Some(package.digest.size),
                    extra: Default::default(),
                },
            );
            tracing::debug!(
                package = %listing.package,
                staged = %package.path.display(),
                path = %path,
                component = %component,
                replaced = replaced,
                "package added to definition"
            );
            package_assets.insert(path, listing.package.to_string());
            METRICS.inc_packages_ingested();
        }
        Ok(package_assets)
    }

    async fn stage(
        &self,
        origin: &str,
        package: &PackageRef,
        workspace: &Workspace,
        signing: Option<SigningContext<'_>>,
    ) -> Result<StagedPackage> {
        let package_system = package
            .extension()
            .ok_or_else(|| ValidationError::MissingExtension {
                package: package.to_string(),
            })?;

        let object = self.store.get(package.as_str()).await?;
        let dest = workspace.origin_dir(origin).join(package.basename());
        let path = object.move_to(&dest).await?;

        if let Some(signing) = signing {
            signing
                .signer
                .sign_package(&path, &package_system, signing.key)
                .await
                .map_err(|source| PipelineError::Signing {
                    target: package.to_string(),
                    source,
                })?;
        }

        let digest = file_digest(&path).await?;
        obs::emit_package_staged(origin, package.as_str(), &package_system, signing.is_some());
        Ok(StagedPackage {
            package_system,
            path,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PackageGroups;
    use crate::workspace::WorkspaceManager;
    use repoforge_store::fakes::MemoryObjectStore;
    use repoforge_tools::fakes::RecordingSigner;

    fn job(add: &str) -> Job {
        Job::new("job").with_add(serde_json::from_str::<PackageGroups>(add).unwrap())
    }

    fn ingestor(store: &Arc<MemoryObjectStore>) -> PackageIngestor {
        PackageIngestor::new(store.clone(), Classifier::default(), 2)
    }

    #[tokio::test]
    async fn stages_packages_and_records_entries_in_order() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).open("job").await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("pkgs/b-1.0.deb", "b");
        store.insert("pkgs/a-1.0.deb", "a");
        store.insert("pkgs/c-1.0.rpm", "c");

        let job = job(
            r#"{"acme": {"stable": ["pkgs/b-1.0.deb", "pkgs/a-1.0.deb", "pkgs/c-1.0.rpm"]}}"#,
        );
        let mut doc = RepositoryDefinition::new();
        let assets = ingestor(&store)
            .ingest(&job, &ws, &mut doc, None)
            .await
            .unwrap();

        let deb: Vec<&str> = doc.entries("deb").iter().map(|e| e.basename()).collect();
        assert_eq!(deb, vec!["b-1.0.deb", "a-1.0.deb"]);
        assert_eq!(doc.entries("rpm").len(), 1);
        assert_eq!(
            assets.get("pool/acme/stable/stable/a-1.0.deb").map(String::as_str),
            Some("pkgs/a-1.0.deb")
        );

        // Moved, not copied: the staged file is in place until teardown.
        let staged = ws.origin_dir("acme").join("b-1.0.deb");
        assert_eq!(std::fs::read(staged).unwrap(), b"b");
        let entry = &doc.entries("deb")[0];
        assert_eq!(entry.size, Some(1));
        assert_eq!(entry.sha256.as_deref().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn same_reference_under_two_codenames_is_fetched_once() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).open("job").await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("pkgs/app-2.0.deb", "app");
        let signer = RecordingSigner::new();

        let job = job(r#"{"acme": {"bookworm": ["pkgs/app-2.0.deb"], "trixie": ["pkgs/app-2.0.deb"]}}"#);
        let mut doc = RepositoryDefinition::new();
        let assets = ingestor(&store)
            .ingest(
                &job,
                &ws,
                &mut doc,
                Some(SigningContext {
                    signer: &signer,
                    key: "KEY",
                }),
            )
            .await
            .unwrap();

        let codenames: Vec<&str> = doc.entries("deb").iter().map(|e| e.codename.as_str()).collect();
        assert_eq!(codenames, vec!["bookworm", "trixie"]);
        assert_eq!(assets.len(), 2);
        assert_eq!(signer.package_calls().len(), 1);
        assert_eq!(signer.package_calls()[0].package_system, "deb");
    }

    #[tokio::test]
    async fn prerelease_packages_land_in_unstable() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).open("job").await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("pkgs/app-1.0.0-rc1.deb", "rc");

        let job = job(r#"{"acme": {"stable": ["pkgs/app-1.0.0-rc1.deb"]}}"#);
        let mut doc = RepositoryDefinition::new();
        ingestor(&store)
            .ingest(&job, &ws, &mut doc, None)
            .await
            .unwrap();

        let entry = &doc.entries("deb")[0];
        assert_eq!(entry.component, "unstable");
        assert_eq!(entry.path, "pool/acme/stable/unstable/app-1.0.0-rc1.deb");
    }

    #[tokio::test]
    async fn missing_package_fails_without_touching_definition() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).open("job").await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("pkgs/a.deb", "a");

        let job = job(r#"{"acme": {"stable": ["pkgs/a.deb", "pkgs/missing.deb"]}}"#);
        let mut doc = RepositoryDefinition::new();
        let err = ingestor(&store)
            .ingest(&job, &ws, &mut doc, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "storage");
        assert!(doc.is_empty());
    }

    #[tokio::test]
    async fn signing_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).open("job").await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("pkgs/bad.rpm", "x");
        let signer = RecordingSigner::new();
        signer.reject("bad.rpm");

        let job = job(r#"{"acme": {"el9": ["pkgs/bad.rpm"]}}"#);
        let mut doc = RepositoryDefinition::new();
        let err = ingestor(&store)
            .ingest(
                &job,
                &ws,
                &mut doc,
                Some(SigningContext {
                    signer: &signer,
                    key: "KEY",
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "signing");
    }

    #[tokio::test]
    async fn removals_drop_matching_entries() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceManager::new(root.path()).open("job").await.unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("pkgs/a.deb", "a");
        store.insert("pkgs/b.deb", "b");
        let ingestor = ingestor(&store);

        let mut doc = RepositoryDefinition::new();
        ingestor
            .ingest(
                &job(r#"{"acme": {"stable": ["pkgs/a.deb", "pkgs/b.deb"]}}"#),
                &ws,
                &mut doc,
                None,
            )
            .await
            .unwrap();

        let removal = Job::new("job").with_remove(
            serde_json::from_str(r#"{"acme": {"stable": ["old/a.deb", "old/zzz.deb"]}}"#).unwrap(),
        );
        assert_eq!(ingestor.remove(&removal, &mut doc), 1);
        let left: Vec<&str> = doc.entries("deb").iter().map(|e| e.basename()).collect();
        assert_eq!(left, vec!["b.deb"]);
    }
}
