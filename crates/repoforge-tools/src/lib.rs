//! Repoforge-Tools: external collaborators for repoforge
//!
//! Signing and repository metadata generation are owned by tooling outside
//! repoforge. This crate defines the interfaces the pipeline needs and
//! command-backed implementations that shell out to configured programs.
//!
//! ## Layer 2 - Collaborators
//!
//! ## Key Components
//!
//! - `Signer`: signs staged packages and generated repository metadata
//! - `MetadataGenerator`: writes native repository metadata for one package system
//! - `CommandSigner` / `CommandGenerator`: templated external commands with timeouts
//! - `fakes`: recording implementations with failure injection

pub mod command;
pub mod error;
pub mod fakes;
pub mod generator;
pub mod signer;

pub use command::{CommandOutput, CommandSpec, DEFAULT_TIMEOUT_SECS};
pub use error::ToolError;
pub use generator::{
    CommandGenerator, GenerateRequest, GeneratorConfig, MetadataGenerator, SigningContext,
};
pub use signer::{CommandSigner, Signer, SignerConfig};

/// Result type for collaborator operations
pub type Result<T> = std::result::Result<T, ToolError>;
