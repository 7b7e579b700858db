//! Repository build pipeline.
//!
//! validate -> open workspace -> fetch definition -> apply removals ->
//! ingest additions -> write definition -> generate/pack/publish per package
//! system -> persist definition -> record result. The workspace is released on
//! every exit path.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use repoforge_store::ObjectStore;
use repoforge_tools::{MetadataGenerator, Signer, SigningContext};
use tracing::Instrument;

use crate::builder::RepositoryBuilder;
use crate::config::PipelineConfig;
use crate::config_store::ConfigStore;
use crate::dispatch::{JobDispatcher, LoggingDispatcher};
use crate::domain::{Job, JobFailure, JobResult, PipelineError, Result};
use crate::ingest::PackageIngestor;
use crate::metrics::METRICS;
use crate::obs;
use crate::recorder::ResultRecorder;
use crate::workspace::{Workspace, WorkspaceManager};

/// Runs build jobs against one object store.
pub struct RepositoryPipeline {
    config: PipelineConfig,
    workspaces: WorkspaceManager,
    configs: ConfigStore,
    ingestor: PackageIngestor,
    builder: RepositoryBuilder,
    recorder: ResultRecorder,
    signer: Option<Arc<dyn Signer>>,
}

impl RepositoryPipeline {
    /// Build a pipeline with no signer and a logging dispatcher.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        generator: Arc<dyn MetadataGenerator>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        let classifier = config
            .classifier()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        Ok(Self {
            workspaces: WorkspaceManager::new(&config.working_directory),
            configs: ConfigStore::new(store.clone()),
            ingestor: PackageIngestor::new(
                store.clone(),
                classifier,
                config.download_concurrency,
            ),
            builder: RepositoryBuilder::new(store, generator),
            recorder: ResultRecorder::new(Arc::new(LoggingDispatcher)),
            signer: None,
            config,
        })
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        self.recorder = ResultRecorder::new(dispatcher);
        self
    }

    /// Run a job using the current time for artifact keys.
    pub async fn run(&self, job: &mut Job) -> Result<JobResult> {
        self.run_at(job, Utc::now()).await
    }

    /// Run a job at a fixed timestamp (used for deterministic tests).
    pub async fn run_at(&self, job: &mut Job, now: DateTime<Utc>) -> Result<JobResult> {
        let span = obs::job_span(&job.id);
        self.run_inner(job, now).instrument(span).await
    }

    async fn run_inner(&self, job: &mut Job, now: DateTime<Utc>) -> Result<JobResult> {
        let started = Instant::now();
        let account = job.account_name(&self.config.default_account).to_string();
        obs::emit_job_started(
            &job.id,
            &account,
            job.additions().count(),
            job.removals().count(),
        );

        if let Err(err) = self.preflight(job) {
            return Err(self.fail(job, err, None).await);
        }
        let workspace = match self.workspaces.open(&job.id).await {
            Ok(workspace) => workspace,
            Err(e) => return Err(self.fail(job, e.into(), None).await),
        };

        match self.execute(job, &account, &workspace, now).await {
            Ok(result) => {
                let packages = result.package_assets.len();
                let artifacts = result.artifacts.len();
                self.recorder.record(job, result.clone(), workspace).await;
                METRICS.inc_jobs_completed();
                obs::emit_job_finished(
                    &job.id,
                    started.elapsed().as_millis() as u64,
                    packages,
                    artifacts,
                );
                Ok(result)
            }
            Err(err) => Err(self.fail(job, err, Some(workspace)).await),
        }
    }

    /// Checks that need no storage: job shape and signing setup.
    fn preflight(&self, job: &Job) -> Result<()> {
        job.validate()?;
        if self.signing_key(job).is_some() && self.signer.is_none() {
            return Err(PipelineError::Configuration(
                "a signing key is in effect but no signer is configured".to_string(),
            ));
        }
        Ok(())
    }

    fn signing_key<'a>(&'a self, job: &'a Job) -> Option<&'a str> {
        self.config.signing_key_for(job.signing_key.as_deref())
    }

    async fn execute(
        &self,
        job: &Job,
        account: &str,
        workspace: &Workspace,
        now: DateTime<Utc>,
    ) -> Result<JobResult> {
        let signing = match (self.signing_key(job), &self.signer) {
            (Some(key), Some(signer)) => Some(SigningContext {
                signer: signer.as_ref(),
                key,
            }),
            _ => None,
        };

        let definition_path = self.configs.fetch(account, workspace).await?;
        let mut document = self.configs.load(&definition_path).await?;

        self.ingestor.remove(job, &mut document);
        let package_assets = self
            .ingestor
            .ingest(job, workspace, &mut document, signing)
            .await?;
        self.configs.write(&definition_path, &document).await?;

        let artifacts = self
            .builder
            .build_and_publish(account, workspace, &document, signing, now)
            .await?;

        let config = self.configs.persist(account, &definition_path).await?;
        obs::emit_definition_persisted(account, &config, document.len());

        Ok(JobResult::new(artifacts, package_assets, config))
    }

    async fn fail(
        &self,
        job: &Job,
        err: PipelineError,
        workspace: Option<Workspace>,
    ) -> PipelineError {
        let failure = JobFailure::from(&err);
        obs::emit_job_failed(&job.id, &failure.kind, &err);
        METRICS.inc_jobs_failed();
        self.recorder.record_failure(job, &failure, workspace).await;
        err
    }
}
