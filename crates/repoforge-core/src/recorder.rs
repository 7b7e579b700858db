//! Attach results to finished jobs and release their workspaces.

use std::sync::Arc;

use crate::dispatch::JobDispatcher;
use crate::domain::{Job, JobFailure, JobResult};
use crate::obs;
use crate::workspace::Workspace;

/// Final step of every job, successful or not.
#[derive(Clone)]
pub struct ResultRecorder {
    dispatcher: Arc<dyn JobDispatcher>,
}

impl ResultRecorder {
    pub fn new(dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Attach `result`, signal completion, then close the workspace.
    ///
    /// The job already succeeded at this point, so a teardown error is only
    /// logged.
    pub async fn record(&self, job: &mut Job, result: JobResult, workspace: Workspace) {
        job.result = Some(result);
        self.dispatcher.job_completed(job).await;
        close(workspace).await;
    }

    /// Signal failure, then close the workspace if one was opened.
    pub async fn record_failure(
        &self,
        job: &Job,
        failure: &JobFailure,
        workspace: Option<Workspace>,
    ) {
        self.dispatcher.job_failed(job, failure).await;
        if let Some(workspace) = workspace {
            close(workspace).await;
        }
    }
}

async fn close(workspace: Workspace) {
    let path = workspace.path().to_path_buf();
    if let Err(e) = workspace.close().await {
        obs::emit_workspace_cleanup_error(&path, &e);
    }
}
