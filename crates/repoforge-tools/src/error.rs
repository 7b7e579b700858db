//! Error types for repoforge-tools

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by external collaborators (signer, metadata generator)
#[derive(Error, Debug)]
pub enum ToolError {
    /// Command template has no program
    #[error("No command configured for {tool}")]
    EmptyCommand { tool: String },

    /// Command did not finish in time
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Command exited non-zero
    #[error("{tool} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    /// Signing rejected by the signer
    #[error("Signing failed for {path}: {reason}")]
    SigningRejected { path: PathBuf, reason: String },

    /// Generator could not produce metadata
    #[error("Metadata generation failed for {package_system}: {reason}")]
    GenerationRejected {
        package_system: String,
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
