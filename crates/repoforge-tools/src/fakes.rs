//! Recording fakes for collaborator traits (testing only)
//!
//! `RecordingSigner` and `StaticGenerator` record every call and support
//! failure injection so pipeline tests can drive error paths without real
//! signing keys or metadata tooling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::generator::{GenerateRequest, MetadataGenerator};
use crate::signer::Signer;
use crate::Result;

/// One recorded signer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignCall {
    pub path: PathBuf,
    pub package_system: String,
    pub key: String,
}

/// Signer that records calls and never touches the files.
#[derive(Debug, Default)]
pub struct RecordingSigner {
    packages: Mutex<Vec<SignCall>>,
    repositories: Mutex<Vec<SignCall>>,
    rejected_basenames: Mutex<HashSet<String>>,
}

impl RecordingSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `sign_package` for any file with this basename.
    pub fn reject(&self, basename: &str) {
        self.rejected_basenames
            .lock()
            .unwrap()
            .insert(basename.to_string());
    }

    pub fn package_calls(&self) -> Vec<SignCall> {
        self.packages.lock().unwrap().clone()
    }

    pub fn repository_calls(&self) -> Vec<SignCall> {
        self.repositories.lock().unwrap().clone()
    }
}

fn call(path: &Path, package_system: &str, key: &str) -> SignCall {
    SignCall {
        path: path.to_path_buf(),
        package_system: package_system.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl Signer for RecordingSigner {
    async fn sign_package(&self, path: &Path, package_system: &str, key: &str) -> Result<()> {
        let rejected = path
            .file_name()
            .map(|name| {
                self.rejected_basenames
                    .lock()
                    .unwrap()
                    .contains(&*name.to_string_lossy())
            })
            .unwrap_or(false);
        if rejected {
            return Err(ToolError::SigningRejected {
                path: path.to_path_buf(),
                reason: "injected signing failure".to_string(),
            });
        }
        self.packages
            .lock()
            .unwrap()
            .push(call(path, package_system, key));
        Ok(())
    }

    async fn sign_repository(
        &self,
        directory: &Path,
        package_system: &str,
        key: &str,
    ) -> Result<()> {
        self.repositories
            .lock()
            .unwrap()
            .push(call(directory, package_system, key));
        Ok(())
    }
}

/// One recorded generator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub package_system: String,
    pub slice: serde_json::Value,
    pub packages_dir: PathBuf,
    pub output_dir: PathBuf,
    pub signing_key: Option<String>,
}

/// Generator that writes a fixed, inspectable tree.
///
/// For system `s` it writes `<output>/<s>-index.json` (the slice, pretty
/// printed) and `<output>/Release` (entry count), then signs the output
/// directory when signing is requested.
#[derive(Debug, Default)]
pub struct StaticGenerator {
    calls: Mutex<Vec<GenerateCall>>,
    failing_systems: Mutex<HashSet<String>>,
    panicking_systems: Mutex<HashSet<String>>,
}

impl StaticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail generation for `package_system`.
    pub fn fail_for(&self, package_system: &str) {
        self.failing_systems
            .lock()
            .unwrap()
            .insert(package_system.to_string());
    }

    /// Panic while generating `package_system`.
    pub fn panic_for(&self, package_system: &str) {
        self.panicking_systems
            .lock()
            .unwrap()
            .insert(package_system.to_string());
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Package systems generated so far, sorted.
    pub fn systems(&self) -> Vec<String> {
        let mut systems: Vec<String> = self
            .calls()
            .into_iter()
            .map(|call| call.package_system)
            .collect();
        systems.sort();
        systems
    }
}

#[async_trait]
impl MetadataGenerator for StaticGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<()> {
        let system = request.package_system;
        self.calls.lock().unwrap().push(GenerateCall {
            package_system: system.to_string(),
            slice: request.slice.clone(),
            packages_dir: request.packages_dir.to_path_buf(),
            output_dir: request.output_dir.to_path_buf(),
            signing_key: request.signing.map(|s| s.key.to_string()),
        });

        if self.panicking_systems.lock().unwrap().contains(system) {
            panic!("injected generator panic for {system}");
        }
        if self.failing_systems.lock().unwrap().contains(system) {
            return Err(ToolError::GenerationRejected {
                package_system: system.to_string(),
                reason: "injected generator failure".to_string(),
            });
        }

        let index = request.output_dir.join(format!("{system}-index.json"));
        tokio::fs::write(&index, serde_json::to_vec_pretty(request.slice)?).await?;
        let count = request.slice.as_array().map(Vec::len).unwrap_or(0);
        tokio::fs::write(
            request.output_dir.join("Release"),
            format!("System: {system}\nPackages: {count}\n"),
        )
        .await?;

        if let Some(signing) = request.signing {
            signing
                .signer
                .sign_repository(request.output_dir, system, signing.key)
                .await?;
        }
        Ok(())
    }
}
