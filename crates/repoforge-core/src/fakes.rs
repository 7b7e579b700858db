//! In-memory fakes for pipeline collaborators (testing only)

use std::sync::Mutex;

use async_trait::async_trait;

use crate::dispatch::JobDispatcher;
use crate::domain::{Job, JobFailure, JobResult};

/// One outcome seen by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Completed {
        job_id: String,
        result: Option<JobResult>,
    },
    Failed {
        job_id: String,
        failure: JobFailure,
    },
}

impl DispatchEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => job_id,
        }
    }
}

/// Dispatcher that records every outcome in call order.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Outcomes recorded for `job_id`.
    pub fn events_for(&self, job_id: &str) -> Vec<DispatchEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.job_id() == job_id)
            .collect()
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn job_completed(&self, job: &Job) {
        self.events.lock().unwrap().push(DispatchEvent::Completed {
            job_id: job.id.clone(),
            result: job.result.clone(),
        });
    }

    async fn job_failed(&self, job: &Job, failure: &JobFailure) {
        self.events.lock().unwrap().push(DispatchEvent::Failed {
            job_id: job.id.clone(),
            failure: failure.clone(),
        });
    }
}
