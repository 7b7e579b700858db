//! Repository metadata generation.
//!
//! A [`MetadataGenerator`] turns a directory of staged packages plus the
//! definition slice for one package system into native repository metadata
//! (apt `dists/`, yum `repodata/`, ...) under an output directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::CommandSpec;
use crate::signer::Signer;
use crate::Result;

/// Signer and key the generator should sign repository metadata with.
#[derive(Clone, Copy)]
pub struct SigningContext<'a> {
    pub signer: &'a dyn Signer,
    pub key: &'a str,
}

impl std::fmt::Debug for SigningContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// One generation request: a single package system.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub package_system: &'a str,

    /// Definition entries for this package system only.
    pub slice: &'a serde_json::Value,

    /// Workspace packages directory; each entry is staged at
    /// `<packages_dir>/<origin>/<basename of path>`.
    pub packages_dir: &'a Path,

    /// Directory the generator must populate. Exists and is empty.
    pub output_dir: &'a Path,

    pub signing: Option<SigningContext<'a>>,
}

impl GenerateRequest<'_> {
    /// Where the definition slice is written for command-line generators.
    pub fn slice_path(&self) -> PathBuf {
        self.output_dir.with_extension("json")
    }
}

/// Produces repository metadata for one package system.
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<()>;
}

/// Generator configuration as it appears in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Placeholders: `{config}`, `{system}`, `{output}`, `{packages}`.
    #[serde(flatten)]
    pub command: CommandSpec,
}

/// Generator backed by an external command.
///
/// The definition slice is written next to the output directory as
/// `<output>.json` and passed via `{config}`.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: CommandSpec,
}

impl CommandGenerator {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl From<GeneratorConfig> for CommandGenerator {
    fn from(config: GeneratorConfig) -> Self {
        Self::new(config.command)
    }
}

#[async_trait]
impl MetadataGenerator for CommandGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<()> {
        let slice_path = request.slice_path();
        tokio::fs::write(&slice_path, serde_json::to_vec_pretty(request.slice)?).await?;

        let config = slice_path.to_string_lossy().into_owned();
        let output = request.output_dir.to_string_lossy().into_owned();
        let packages = request.packages_dir.to_string_lossy().into_owned();
        let result = self
            .command
            .run(
                "metadata generator",
                &[
                    ("config", config.as_str()),
                    ("system", request.package_system),
                    ("output", output.as_str()),
                    ("packages", packages.as_str()),
                ],
            )
            .await;

        let _ = tokio::fs::remove_file(&slice_path).await;
        let output_info = result?;
        info!(
            package_system = %request.package_system,
            duration_ms = output_info.duration_ms,
            "generated repository metadata"
        );

        if let Some(signing) = request.signing {
            signing
                .signer
                .sign_repository(request.output_dir, request.package_system, signing.key)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::fakes::RecordingSigner;

    struct Dirs {
        _root: tempfile::TempDir,
        packages: PathBuf,
        output: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = tempfile::tempdir().unwrap();
        let packages = root.path().join("packages");
        let output = root.path().join("generated-repositories").join("deb");
        std::fs::create_dir_all(&packages).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        Dirs {
            _root: root,
            packages,
            output,
        }
    }

    #[tokio::test]
    async fn command_generator_sees_slice_and_fills_output() {
        let d = dirs();
        // Copy the slice into the output tree so the test can inspect it.
        let generator = CommandGenerator::new(CommandSpec::new([
            "sh",
            "-c",
            "cp \"$0\" \"$1/index.json\" && echo \"$2\" > \"$1/system\"",
            "{config}",
            "{output}",
            "{system}",
        ]));
        let slice = serde_json::json!([{"origin": "acme", "path": "pool/acme/x.deb"}]);

        generator
            .generate(GenerateRequest {
                package_system: "deb",
                slice: &slice,
                packages_dir: &d.packages,
                output_dir: &d.output,
                signing: None,
            })
            .await
            .unwrap();

        let copied: serde_json::Value =
            serde_json::from_slice(&std::fs::read(d.output.join("index.json")).unwrap()).unwrap();
        assert_eq!(copied, slice);
        assert_eq!(
            std::fs::read_to_string(d.output.join("system")).unwrap().trim(),
            "deb"
        );
        // The slice file is scratch and does not outlive the call.
        assert!(!d.output.with_extension("json").exists());
    }

    #[tokio::test]
    async fn command_generator_signs_output_when_requested() {
        let d = dirs();
        let generator = CommandGenerator::new(CommandSpec::new(["true"]));
        let signer = RecordingSigner::new();
        let slice = serde_json::json!([]);

        generator
            .generate(GenerateRequest {
                package_system: "deb",
                slice: &slice,
                packages_dir: &d.packages,
                output_dir: &d.output,
                signing: Some(SigningContext {
                    signer: &signer,
                    key: "KEY1",
                }),
            })
            .await
            .unwrap();

        let calls = signer.repository_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, d.output);
        assert_eq!(calls[0].package_system, "deb");
        assert_eq!(calls[0].key, "KEY1");
    }

    #[tokio::test]
    async fn command_generator_failure_skips_signing() {
        let d = dirs();
        let generator = CommandGenerator::new(CommandSpec::new(["false"]));
        let signer = RecordingSigner::new();
        let slice = serde_json::json!([]);

        let err = generator
            .generate(GenerateRequest {
                package_system: "deb",
                slice: &slice,
                packages_dir: &d.packages,
                output_dir: &d.output,
                signing: Some(SigningContext {
                    signer: &signer,
                    key: "KEY1",
                }),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::CommandFailed { .. }));
        assert!(signer.repository_calls().is_empty());
    }

    #[test]
    fn config_flattens_command() {
        let config: GeneratorConfig = serde_json::from_value(serde_json::json!({
            "command": ["repogen", "{config}", "{output}"]
        }))
        .unwrap();
        assert_eq!(config.command.command[0], "repogen");
    }
}
