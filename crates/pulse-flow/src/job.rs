//! The per-job record.
//!
//! A [`PipelineJob`] accumulates each stage's result under a stage-specific
//! key so later stages and the status read can address earlier results by
//! path. The record is persisted after every transition (the write-ahead
//! record replacing the managed workflow's implicit durability).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pulse_core::JobId;

use crate::filter::FilterSet;
use crate::state::{JobEvent, JobState};

/// Stage-specific keys in the result envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKey {
    /// Query stage output: job id, query, filters, located extract name.
    ProcessingJob,
    /// Clustering stage acknowledgement.
    ClusteringJob,
    /// Synthesis stage output: the insight report.
    SynthesisResult,
}

impl StageKey {
    /// The envelope key for this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessingJob => "processing_job",
            Self::ClusteringJob => "clustering_job",
            Self::SynthesisResult => "synthesis_result",
        }
    }
}

/// Failure details carried by a failed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobFailure {
    /// Fixed user-facing message.
    pub message: String,
    /// Structured cause, for observability only.
    pub cause: String,
}

/// One end-to-end pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    /// The job identifier, generated once at pipeline start.
    pub job_id: JobId,
    /// The original natural-language query.
    pub query: String,
    /// The caller-supplied filter constraints.
    pub filters: FilterSet,
    /// Base file name of the filtered extract, set by the query stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    /// Current state.
    pub state: JobState,
    /// Accumulated per-stage results.
    #[serde(default)]
    pub results: serde_json::Map<String, Value>,
    /// Failure details, present iff the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last persisted transition.
    pub updated_at: DateTime<Utc>,
    /// Version token for CAS updates; managed by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PipelineJob {
    /// Creates a new pending job.
    #[must_use]
    pub fn new(job_id: JobId, query: impl Into<String>, filters: FilterSet) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            query: query.into(),
            filters,
            object_name: None,
            state: JobState::Pending,
            results: serde_json::Map::new(),
            failure: None,
            created_at: now,
            updated_at: now,
            version: None,
        }
    }

    /// Applies an event and records the transition time.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` for an event the current
    /// state does not accept.
    pub fn transition(&mut self, event: JobEvent) -> crate::error::Result<()> {
        self.state = self.state.apply(event)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Merges a stage's result into the envelope under its key.
    pub fn record_result(&mut self, stage: StageKey, result: Value) {
        self.results.insert(stage.as_str().to_string(), result);
    }

    /// Reads a stage's result back out of the envelope.
    #[must_use]
    pub fn stage_result(&self, stage: StageKey) -> Option<&Value> {
        self.results.get(stage.as_str())
    }

    /// Marks the job failed with the fixed user message and structured cause.
    pub fn fail(&mut self, error: &crate::error::Error) {
        self.state = JobState::Failed;
        self.failure = Some(JobFailure {
            message: error.user_message().to_string(),
            cause: error.to_string(),
        });
        self.updated_at = Utc::now();
    }

    /// The orchestrator's execution name for this job.
    #[must_use]
    pub fn execution_name(&self) -> String {
        self.job_id.execution_name()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Error;

    fn job() -> PipelineJob {
        PipelineJob::new(JobId::generate(), "sentiment in East?", FilterSet::empty())
    }

    #[test]
    fn stage_results_are_addressable_by_key() {
        let mut job = job();
        job.record_result(StageKey::ProcessingJob, json!({"object_name": "east.csv"}));
        assert_eq!(
            job.stage_result(StageKey::ProcessingJob).unwrap()["object_name"],
            "east.csv"
        );
        assert!(job.stage_result(StageKey::SynthesisResult).is_none());
    }

    #[test]
    fn failing_attaches_fixed_message_and_cause() {
        let mut job = job();
        job.fail(&Error::query_execution("engine exploded"));
        assert_eq!(job.state, JobState::Failed);
        let failure = job.failure.unwrap();
        assert_eq!(failure.message, crate::error::GENERIC_FAILURE_MESSAGE);
        assert!(failure.cause.contains("engine exploded"));
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut job = job();
        job.transition(JobEvent::Started).unwrap();
        job.record_result(StageKey::ClusteringJob, json!({"status": "done"}));
        let text = serde_json::to_string(&job).unwrap();
        let back: PipelineJob = serde_json::from_str(&text).unwrap();
        assert_eq!(back.job_id, job.job_id);
        assert_eq!(back.state, JobState::RunningQuery);
        assert_eq!(back.results, job.results);
    }
}
