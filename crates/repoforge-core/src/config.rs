//! Pipeline configuration.
//!
//! Everything the pipeline needs is passed in explicitly at construction
//! time; nothing is read from process-wide settings. Loadable from TOML:
//!
//! ```toml
//! working_directory = "/var/lib/repoforge/work"
//! signing_key = "0xDEADBEEF"
//! default_account = "default"
//! prerelease_markers = ["alpha", "beta", "-rc"]
//! download_concurrency = 4
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{Classifier, DEFAULT_PRERELEASE_MARKERS};
use crate::domain::job::is_safe_segment;

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

fn default_working_directory() -> PathBuf {
    std::env::temp_dir().join("repoforge")
}

fn default_account() -> String {
    "default".to_string()
}

fn default_markers() -> Vec<String> {
    DEFAULT_PRERELEASE_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_download_concurrency() -> usize {
    4
}

/// Recognized pipeline options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which per-job workspaces are created.
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// Signing key used when a job does not carry its own.
    #[serde(default)]
    pub signing_key: Option<String>,

    /// Account used when a job names none.
    #[serde(default = "default_account")]
    pub default_account: String,

    #[serde(default = "default_markers")]
    pub prerelease_markers: Vec<String>,

    /// Maximum package downloads in flight per job.
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_directory: default_working_directory(),
            signing_key: None,
            default_account: default_account(),
            prerelease_markers: default_markers(),
            download_concurrency: default_download_concurrency(),
        }
    }
}

impl PipelineConfig {
    /// Defaults rooted at `working_directory`.
    pub fn with_working_directory(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "'download_concurrency' must be at least 1".to_string(),
            ));
        }
        if !is_safe_segment(&self.default_account) {
            return Err(ConfigError::ValidationError(format!(
                "'default_account' must be a single path segment, got {:?}",
                self.default_account
            )));
        }
        if self.working_directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "'working_directory' must not be empty".to_string(),
            ));
        }
        self.classifier()?;
        Ok(())
    }

    /// Classifier for the configured prerelease markers.
    pub fn classifier(&self) -> Result<Classifier, ConfigError> {
        Classifier::new(&self.prerelease_markers).map_err(|e| {
            ConfigError::ValidationError(format!("invalid 'prerelease_markers': {e}"))
        })
    }

    /// Signing key in effect for a job: the job's own, else the configured one.
    pub fn signing_key_for<'a>(&'a self, job_key: Option<&'a str>) -> Option<&'a str> {
        let usable = |key: &&str| !key.trim().is_empty();
        job_key
            .filter(usable)
            .or_else(|| self.signing_key.as_deref().filter(usable))
    }
}
