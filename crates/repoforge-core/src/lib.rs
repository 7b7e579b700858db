//! Repoforge Core Library
//!
//! Builds and republishes package repositories from packages uploaded to an
//! object store, one add/remove job at a time.
//!
//! ## Key Components
//!
//! - `RepositoryPipeline`: end-to-end job execution
//! - `ConfigStore`: fetch-or-create / persist the repository definition
//! - `WorkspaceManager`: job-scoped directories released on every exit path
//! - `PackageIngestor`: stage, classify, sign and record packages
//! - `RepositoryBuilder`: generate, pack and publish per package system
//! - `ResultRecorder`: attach results and notify the `JobDispatcher`

pub mod builder;
pub mod checksum;
pub mod classify;
pub mod config;
pub mod config_store;
pub mod dispatch;
pub mod domain;
pub mod fakes;
pub mod ingest;
pub mod keys;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod recorder;
pub mod telemetry;
pub mod workspace;

pub use builder::RepositoryBuilder;
pub use classify::{Classifier, Component, DEFAULT_PRERELEASE_MARKERS};
pub use config::{ConfigError, PipelineConfig};
pub use config_store::ConfigStore;
pub use dispatch::{JobDispatcher, LoggingDispatcher};
pub use domain::{
    Account, GeneratedArtifact, Job, JobFailure, JobResult, PackageEntry, PackageGroups,
    PackageRef, PipelineError, RepositoryDefinition, Result, ValidationError,
};
pub use ingest::PackageIngestor;
pub use keys::{artifact_key, canonical_path, config_key};
pub use metrics::METRICS;
pub use obs::{
    emit_artifact_published, emit_definition_fallback, emit_definition_persisted,
    emit_job_failed, emit_job_finished, emit_job_started, emit_package_staged,
    emit_packages_removed, emit_workspace_cleanup_error, job_span,
};
pub use pipeline::RepositoryPipeline;
pub use recorder::ResultRecorder;
pub use telemetry::init_tracing;
pub use workspace::{Workspace, WorkspaceManager};
