//! Persistence for in-flight jobs.
//!
//! Each job has an explicit write-ahead record at `jobs/<jobId>.json`,
//! updated with compare-and-swap after every transition. Any
//! [`StorageBackend`] serves as the store; tests use the in-memory backend.

use async_trait::async_trait;
use bytes::Bytes;

use pulse_core::{JobId, ObjectPaths, StorageBackend, WritePrecondition, WriteResult};

use crate::error::{Error, Result};
use crate::job::PipelineJob;

/// Storage abstraction for job records.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Creates the record for a new job.
    ///
    /// Fails with `Error::JobConflict` if a record already exists.
    async fn create(&self, job: &PipelineJob) -> Result<()>;

    /// Loads a job record.
    ///
    /// Fails with `Error::JobNotFound` if no record exists.
    async fn load(&self, job_id: JobId) -> Result<PipelineJob>;

    /// Persists an updated record, CAS-guarded by the version loaded with it.
    ///
    /// On success the job's version is advanced in place. Fails with
    /// `Error::JobConflict` if a concurrent update won the race.
    async fn update(&self, job: &mut PipelineJob) -> Result<()>;
}

/// Job store backed by any [`StorageBackend`].
pub struct StorageJobStore {
    storage: std::sync::Arc<dyn StorageBackend>,
}

impl StorageJobStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(storage: std::sync::Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

fn encode(job: &PipelineJob) -> Result<Bytes> {
    let mut record = job.clone();
    // The version token travels beside the record, not inside it.
    record.version = None;
    serde_json::to_vec(&record)
        .map(Bytes::from)
        .map_err(|e| Error::serialization(format!("job record encode failed: {e}")))
}

#[async_trait]
impl JobStore for StorageJobStore {
    async fn create(&self, job: &PipelineJob) -> Result<()> {
        let key = ObjectPaths::job_record(job.job_id);
        let result = self
            .storage
            .put(&key, encode(job)?, WritePrecondition::DoesNotExist)
            .await?;
        match result {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { .. } => Err(Error::JobConflict {
                job_id: job.job_id,
            }),
        }
    }

    async fn load(&self, job_id: JobId) -> Result<PipelineJob> {
        let key = ObjectPaths::job_record(job_id);
        let data = match self.storage.get(&key).await {
            Ok(data) => data,
            Err(err) if err.is_not_found() => return Err(Error::JobNotFound { job_id }),
            Err(err) => return Err(err.into()),
        };
        let meta = self.storage.head(&key).await?;
        let mut job: PipelineJob = serde_json::from_slice(&data)
            .map_err(|e| Error::serialization(format!("job record decode failed: {e}")))?;
        job.version = meta.map(|m| m.version);
        Ok(job)
    }

    async fn update(&self, job: &mut PipelineJob) -> Result<()> {
        let key = ObjectPaths::job_record(job.job_id);
        let precondition = match &job.version {
            Some(version) => WritePrecondition::MatchesVersion(version.clone()),
            None => WritePrecondition::DoesNotExist,
        };
        let result = self
            .storage
            .put(&key, encode(job)?, precondition)
            .await?;
        match result {
            WriteResult::Success { version } => {
                job.version = Some(version);
                Ok(())
            }
            WriteResult::PreconditionFailed { .. } => Err(Error::JobConflict {
                job_id: job.job_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pulse_core::MemoryBackend;

    use super::*;
    use crate::filter::FilterSet;
    use crate::state::{JobEvent, JobState};

    fn store() -> StorageJobStore {
        StorageJobStore::new(Arc::new(MemoryBackend::new()))
    }

    fn job() -> PipelineJob {
        PipelineJob::new(JobId::generate(), "q", FilterSet::empty())
    }

    #[tokio::test]
    async fn create_load_update_round_trip() {
        let store = store();
        let mut job = job();
        store.create(&job).await.unwrap();

        let mut loaded = store.load(job.job_id).await.unwrap();
        assert_eq!(loaded.state, JobState::Pending);
        assert!(loaded.version.is_some());

        loaded.transition(JobEvent::Started).unwrap();
        store.update(&mut loaded).await.unwrap();

        let reloaded = store.load(job.job_id).await.unwrap();
        assert_eq!(reloaded.state, JobState::RunningQuery);

        // A writer holding the original (stale) version loses the race.
        job.version = Some("1".to_string());
        job.transition(JobEvent::Started).unwrap();
        let err = store.update(&mut job).await.unwrap_err();
        assert!(matches!(err, Error::JobConflict { .. }));
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let store = store();
        let job = job();
        store.create(&job).await.unwrap();
        assert!(matches!(
            store.create(&job).await.unwrap_err(),
            Error::JobConflict { .. }
        ));
    }

    #[tokio::test]
    async fn load_unknown_job_is_not_found() {
        let store = store();
        let err = store.load(JobId::generate()).await.unwrap_err();
        assert!(matches!(err, Error::JobNotFound { .. }));
    }
}
