//! Job outcome notification.
//!
//! The messaging layer that delivered the job is outside repoforge; the
//! pipeline only tells a [`JobDispatcher`] how each job ended. Exactly one of
//! `job_completed` / `job_failed` is called per job.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{Job, JobFailure};

/// Receives the outcome of every job.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// The job finished; `job.result` is populated.
    async fn job_completed(&self, job: &Job);

    /// The job failed before completing.
    async fn job_failed(&self, job: &Job, failure: &JobFailure);
}

/// Dispatcher that only logs outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDispatcher;

#[async_trait]
impl JobDispatcher for LoggingDispatcher {
    async fn job_completed(&self, job: &Job) {
        let (artifacts, config) = job
            .result
            .as_ref()
            .map(|result| (result.artifacts.len(), result.config.as_str()))
            .unwrap_or((0, ""));
        info!(job_id = %job.id, artifacts = artifacts, config = %config, "job completed");
    }

    async fn job_failed(&self, job: &Job, failure: &JobFailure) {
        warn!(job_id = %job.id, kind = %failure.kind, error = %failure.message, "job failed");
    }
}
