//! Package and repository signing.
//!
//! The signing algorithm and key material live outside repoforge; a
//! [`Signer`] is handed a file or directory, the package system it belongs
//! to, and an opaque key reference.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::CommandSpec;
use crate::Result;

/// Signs staged packages and generated repository metadata.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a single package file in place.
    async fn sign_package(&self, path: &Path, package_system: &str, key: &str) -> Result<()>;

    /// Sign the repository metadata generated into `directory`.
    async fn sign_repository(&self, directory: &Path, package_system: &str, key: &str)
        -> Result<()>;
}

/// Signer configuration as it appears in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Run once per package. Placeholders: `{file}`, `{system}`, `{key}`.
    pub package: CommandSpec,

    /// Run once per generated repository. Placeholders: `{dir}`, `{system}`, `{key}`.
    #[serde(default)]
    pub repository: Option<CommandSpec>,
}

/// Signer backed by external commands.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    package: CommandSpec,
    repository: Option<CommandSpec>,
}

impl CommandSigner {
    pub fn new(package: CommandSpec) -> Self {
        Self {
            package,
            repository: None,
        }
    }

    /// Also sign generated repository metadata with `command`.
    pub fn with_repository_command(mut self, command: CommandSpec) -> Self {
        self.repository = Some(command);
        self
    }
}

impl From<SignerConfig> for CommandSigner {
    fn from(config: SignerConfig) -> Self {
        Self {
            package: config.package,
            repository: config.repository,
        }
    }
}

#[async_trait]
impl Signer for CommandSigner {
    async fn sign_package(&self, path: &Path, package_system: &str, key: &str) -> Result<()> {
        let file = path.to_string_lossy().into_owned();
        self.package
            .run(
                "package signer",
                &[("file", file.as_str()), ("system", package_system), ("key", key)],
            )
            .await?;
        info!(path = %path.display(), package_system = %package_system, "signed package");
        Ok(())
    }

    async fn sign_repository(
        &self,
        directory: &Path,
        package_system: &str,
        key: &str,
    ) -> Result<()> {
        let Some(command) = &self.repository else {
            debug!(package_system = %package_system, "no repository signing command configured");
            return Ok(());
        };
        let dir = directory.to_string_lossy().into_owned();
        command
            .run(
                "repository signer",
                &[("dir", dir.as_str()), ("system", package_system), ("key", key)],
            )
            .await?;
        info!(directory = %directory.display(), package_system = %package_system, "signed repository metadata");
        Ok(())
    }
}
