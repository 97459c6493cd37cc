//! Scripted in-memory fakes for the managed-service seams.
//!
//! Each fake replays a queue of pre-programmed responses and records what it
//! was asked, so tests can assert both behavior and wiring. Not suitable for
//! production.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use pulse_core::{JobId, ObjectPaths, StorageBackend, WritePrecondition};

use super::{ClusterProcessor, QueryEngine, QueryStatus, TextModel};
use crate::error::{Error, Result};

/// Scripted [`QueryEngine`] fake.
#[derive(Debug, Default)]
pub struct ScriptedQueryEngine {
    statuses: Mutex<VecDeque<QueryStatus>>,
    row_count: Mutex<u64>,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedQueryEngine {
    /// Creates a fake that will report the given status sequence and row count.
    #[must_use]
    pub fn new(statuses: impl IntoIterator<Item = QueryStatus>, row_count: u64) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            row_count: Mutex::new(row_count),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Returns the SQL statements submitted so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueryEngine for ScriptedQueryEngine {
    async fn start_query(
        &self,
        sql: &str,
        _database: &str,
        _output_location: &str,
    ) -> Result<String> {
        self.submitted
            .lock()
            .map_err(|_| Error::external("lock poisoned"))?
            .push(sql.to_string());
        Ok("exec-0001".to_string())
    }

    async fn poll(&self, _execution_id: &str) -> Result<QueryStatus> {
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|_| Error::external("lock poisoned"))?;
        // The final scripted status repeats, so polls past the script's end
        // keep observing it.
        if statuses.len() == 1 {
            return statuses
                .front()
                .cloned()
                .ok_or_else(|| Error::external("scripted engine has no statuses"));
        }
        statuses
            .pop_front()
            .ok_or_else(|| Error::external("scripted engine has no statuses"))
    }

    async fn result_row_count(&self, _execution_id: &str) -> Result<u64> {
        Ok(*self
            .row_count
            .lock()
            .map_err(|_| Error::external("lock poisoned"))?)
    }
}

/// Scripted [`TextModel`] fake.
#[derive(Debug, Default)]
pub struct ScriptedTextModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextModel {
    /// Creates a fake that will return the given responses in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextModel for ScriptedTextModel {
    async fn generate(&self, _model_id: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| Error::external("lock poisoned"))?
            .push(prompt.to_string());
        self.responses
            .lock()
            .map_err(|_| Error::external("lock poisoned"))?
            .pop_front()
            .ok_or_else(|| Error::external("scripted model ran out of responses"))
    }
}

/// [`ClusterProcessor`] fake that writes a canned clustered extract to the
/// job-scoped output key.
pub struct InlineClusterProcessor {
    storage: Arc<dyn StorageBackend>,
    extract: Bytes,
}

impl InlineClusterProcessor {
    /// Creates a fake that writes `extract` as the clustering output.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, extract: impl Into<Bytes>) -> Self {
        Self {
            storage,
            extract: extract.into(),
        }
    }
}

#[async_trait]
impl ClusterProcessor for InlineClusterProcessor {
    async fn run(&self, job_id: JobId, _object_name: &str) -> Result<()> {
        self.storage
            .put(
                &ObjectPaths::clustered_results(job_id),
                self.extract.clone(),
                WritePrecondition::None,
            )
            .await?;
        Ok(())
    }
}

/// [`ClusterProcessor`] fake that always fails, for error-path tests.
#[derive(Debug, Default)]
pub struct FailingClusterProcessor;

#[async_trait]
impl ClusterProcessor for FailingClusterProcessor {
    async fn run(&self, _job_id: JobId, _object_name: &str) -> Result<()> {
        Err(Error::external("clustering job crashed"))
    }
}
