//! The job orchestrator.
//!
//! Sequences the pipeline stages for one job, threading the job id through
//! each stage and merging every stage's result into the job's envelope.
//! Stages run one at a time within a job; independent jobs run concurrently
//! on their own tasks with no shared mutable state.

use std::sync::Arc;

use serde_json::json;

use pulse_core::observability::pipeline_span;
use pulse_core::{JobId, ObjectPaths, PipelineConfig, StorageBackend};
use tracing::Instrument;

use crate::clients::{ClusterProcessor, QueryEngine, TextModel};
use crate::error::{Error, Result};
use crate::job::{PipelineJob, StageKey};
use crate::query_runner::ManagedQueryRunner;
use crate::state::{JobEvent, JobState};
use crate::store::JobStore;
use crate::synthesizer::InsightSynthesizer;
use crate::validator::{INVALID_QUERY_MESSAGE, QueryValidator, Verdict};
use crate::{FilterSet, sql};

struct Inner {
    validator: QueryValidator,
    query_runner: ManagedQueryRunner,
    cluster: Arc<dyn ClusterProcessor>,
    synthesizer: InsightSynthesizer,
    store: Arc<dyn JobStore>,
    config: PipelineConfig,
}

/// Drives pipeline jobs from validated query to terminal state.
#[derive(Clone)]
pub struct PipelineRunner {
    inner: Arc<Inner>,
}

impl PipelineRunner {
    /// Wires a runner from the service seams and configuration.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        engine: Arc<dyn QueryEngine>,
        model: Arc<dyn TextModel>,
        cluster: Arc<dyn ClusterProcessor>,
        store: Arc<dyn JobStore>,
        config: PipelineConfig,
    ) -> Self {
        let validator = QueryValidator::new(model.clone(), &config.model_id);
        let query_runner =
            ManagedQueryRunner::new(engine, storage.clone(), config.clone());
        let synthesizer = InsightSynthesizer::new(storage, model, config.clone());
        Self {
            inner: Arc::new(Inner {
                validator,
                query_runner,
                cluster,
                synthesizer,
                store,
                config,
            }),
        }
    }

    /// Gates the query and creates the job record, without running it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the gate rejects the query.
    pub async fn submit(&self, query: &str, filters: FilterSet) -> Result<JobId> {
        if self.inner.validator.validate(query).await? == Verdict::Invalid {
            return Err(Error::validation(INVALID_QUERY_MESSAGE));
        }
        let job_id = JobId::generate();
        let job = PipelineJob::new(job_id, query, filters);
        self.inner.store.create(&job).await?;
        tracing::info!(job_id = %job_id, "pipeline job created");
        Ok(job_id)
    }

    /// Gates the query, creates the job, and runs it on its own task.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the gate rejects the query; stage
    /// faults surface only through the job record.
    pub async fn start(&self, query: &str, filters: FilterSet) -> Result<JobId> {
        let job_id = self.submit(query, filters).await?;
        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(err) = runner.execute(job_id).await {
                tracing::error!(job_id = %job_id, error = %err, "job execution aborted");
            }
        });
        Ok(job_id)
    }

    /// Runs a created job to its terminal state.
    ///
    /// Stage faults are absorbed into the job record (`Failed` with the
    /// fixed user message and structured cause).
    ///
    /// # Errors
    ///
    /// Returns an error only when the job record itself cannot be read or
    /// written.
    pub async fn execute(&self, job_id: JobId) -> Result<JobState> {
        let mut job = self.inner.store.load(job_id).await?;
        if job.state.is_terminal() {
            return Ok(job.state);
        }
        job.transition(JobEvent::Started)?;
        self.inner.store.update(&mut job).await?;

        match self.run_stages(&mut job).await {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "pipeline job succeeded");
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "pipeline job failed");
                job.fail(&err);
                self.inner.store.update(&mut job).await?;
            }
        }
        Ok(job.state)
    }

    async fn run_stages(&self, job: &mut PipelineJob) -> Result<()> {
        let job_id = job.job_id;

        let sql = sql::compile(&self.inner.config.table, &job.filters)?;
        tracing::debug!(job_id = %job_id, sql = %sql, "compiled filter query");
        let object_name = self
            .inner
            .query_runner
            .run(&sql)
            .instrument(pipeline_span("managed_query", job_id))
            .await?;
        job.object_name = Some(object_name.clone());
        job.record_result(
            StageKey::ProcessingJob,
            json!({
                "job_id": job_id,
                "query": job.query,
                "filters": job.filters,
                "object_name": object_name,
            }),
        );
        job.transition(JobEvent::QueryCompleted)?;
        self.inner.store.update(job).await?;

        self.inner
            .cluster
            .run(job_id, &object_name)
            .instrument(pipeline_span("cluster_comments", job_id))
            .await?;
        job.record_result(
            StageKey::ClusteringJob,
            json!({
                "status": "COMPLETED",
                "output_key": ObjectPaths::clustered_results(job_id),
            }),
        );
        job.transition(JobEvent::ClusteringCompleted)?;
        self.inner.store.update(job).await?;

        let report = self
            .inner
            .synthesizer
            .synthesize(&job.query, job_id)
            .instrument(pipeline_span("synthesize_insights", job_id))
            .await?;
        let report = serde_json::to_value(&report)
            .map_err(|e| Error::serialization(format!("report encode failed: {e}")))?;
        job.record_result(StageKey::SynthesisResult, report);
        job.transition(JobEvent::SynthesisCompleted)?;
        self.inner.store.update(job).await?;
        Ok(())
    }

    /// Reads the current record of a job.
    ///
    /// # Errors
    ///
    /// Returns `Error::JobNotFound` for an unknown id.
    pub async fn job(&self, job_id: JobId) -> Result<PipelineJob> {
        self.inner.store.load(job_id).await
    }
}
