//! Structured observability hooks for the repository job lifecycle.
//!
//! This module provides:
//! - A job-scoped tracing span via [`job_span`]
//! - Emission functions for lifecycle events: job start/finish/failure,
//!   package staging, artifact publication, definition fetch fallback
//!
//! Events are emitted at `info!` level (configurable via `REPOFORGE_LOG`).

use std::fmt::Display;

use tracing::{info, warn};

/// Span tagging every event of one job with its id.
pub fn job_span(job_id: &str) -> tracing::Span {
    tracing::info_span!("repoforge.job", job_id = %job_id)
}

/// Emit event: job accepted with the size of its add/remove sets.
pub fn emit_job_started(job_id: &str, account: &str, additions: usize, removals: usize) {
    info!(
        event = "job.started",
        job_id = %job_id,
        account = %account,
        additions = additions,
        removals = removals,
    );
}

/// Emit event: job finished successfully.
pub fn emit_job_finished(job_id: &str, duration_ms: u64, packages: usize, artifacts: usize) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        duration_ms = duration_ms,
        packages = packages,
        artifacts = artifacts,
    );
}

/// Emit event: job failed (warning level).
pub fn emit_job_failed(job_id: &str, kind: &str, error: &dyn Display) {
    warn!(event = "job.failed", job_id = %job_id, kind = %kind, error = %error);
}

/// Emit event: one package fetched and staged into the workspace.
pub fn emit_package_staged(origin: &str, package: &str, package_system: &str, signed: bool) {
    info!(
        event = "package.staged",
        origin = %origin,
        package = %package,
        package_system = %package_system,
        signed = signed,
    );
}

/// Emit event: entries dropped from the definition by the job's remove set.
pub fn emit_packages_removed(requested: usize, removed: usize) {
    info!(event = "package.removed", requested = requested, removed = removed);
}

/// Emit event: one repository archive uploaded.
pub fn emit_artifact_published(package_system: &str, key: &str, size: u64) {
    info!(
        event = "artifact.published",
        package_system = %package_system,
        key = %key,
        size = size,
    );
}

/// Emit event: no usable definition in the store, starting from `{}` (warning level).
pub fn emit_definition_fallback(account: &str, key: &str, error: &dyn Display) {
    warn!(
        event = "definition.fetch_fallback",
        account = %account,
        key = %key,
        error = %error,
    );
}

/// Emit event: definition persisted to the store.
pub fn emit_definition_persisted(account: &str, key: &str, entries: usize) {
    info!(
        event = "definition.persisted",
        account = %account,
        key = %key,
        entries = entries,
    );
}

/// Emit event: workspace teardown failed (warning level).
pub fn emit_workspace_cleanup_error(path: &std::path::Path, error: &dyn Display) {
    warn!(event = "workspace.cleanup_error", path = %path.display(), error = %error);
}
