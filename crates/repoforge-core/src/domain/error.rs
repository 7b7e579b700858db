//! Error taxonomy for the repository build pipeline.

use std::path::PathBuf;

use repoforge_store::StorageError;
use repoforge_tools::ToolError;
use serde::{Deserialize, Serialize};

/// Job problems detected before any side effect.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("job has neither an add nor a remove set")]
    NothingToDo,

    #[error("job id {id:?} is not a single path segment")]
    InvalidJobId { id: String },

    #[error("account name {name:?} is not a single path segment")]
    InvalidAccount { name: String },

    #[error("origin {origin:?} is not a single path segment")]
    InvalidOrigin { origin: String },

    #[error("package {package} has no file extension to derive a package system from")]
    MissingExtension { package: String },

    #[error("origin {origin} lists two packages named {basename}: {first} and {second}")]
    DuplicatePackage {
        origin: String,
        basename: String,
        first: String,
        second: String,
    },
}

/// Repository pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid job: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("signing failed for {target}: {source}")]
    Signing {
        target: String,
        #[source]
        source: ToolError,
    },

    #[error("metadata generation failed for {package_system}: {source}")]
    Generation {
        package_system: String,
        #[source]
        source: ToolError,
    },

    #[error("repository definition {path} is corrupt: {source}")]
    DocumentCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Failure class reported to the dispatcher.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::Storage(_) => "storage",
            Self::Signing { .. } => "signing",
            Self::Generation { .. } => "generation",
            Self::DocumentCorrupt { .. } | Self::Serialization(_) => "document",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure summary handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
}

impl From<&PipelineError> for JobFailure {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_failures() {
        let err: PipelineError = ValidationError::NothingToDo.into();
        assert_eq!(err.kind(), "validation");

        let err: PipelineError = StorageError::UploadFailed {
            key: "k".into(),
            reason: "503".into(),
        }
        .into();
        assert_eq!(err.kind(), "storage");

        let err = PipelineError::Signing {
            target: "app.deb".into(),
            source: ToolError::SigningRejected {
                path: "app.deb".into(),
                reason: "no key".into(),
            },
        };
        assert_eq!(err.kind(), "signing");
        assert!(err.to_string().contains("app.deb"));
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let err: PipelineError = ValidationError::DuplicatePackage {
            origin: "acme".into(),
            basename: "app.deb".into(),
            first: "a/app.deb".into(),
            second: "b/app.deb".into(),
        }
        .into();
        let failure = JobFailure::from(&err);
        assert_eq!(failure.kind, "validation");
        assert!(failure.message.contains("a/app.deb"));
        assert!(failure.message.contains("b/app.deb"));
    }
}
