//! The managed-query stage.
//!
//! Submits compiled SQL to the query engine, polls to a terminal state under
//! an overall deadline, gates on the result row count, and selects the
//! newest output object under the `filter/` prefix, skipping the engine's
//! metadata sidecar.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use pulse_core::paths::{self, FILTER_PREFIX, ObjectPaths};
use pulse_core::{ObjectMeta, PipelineConfig, StorageBackend};

use crate::clients::{QueryEngine, QueryState};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Runs compiled SQL through the managed query engine.
pub struct ManagedQueryRunner {
    engine: Arc<dyn QueryEngine>,
    storage: Arc<dyn StorageBackend>,
    config: PipelineConfig,
    retry: RetryPolicy,
}

impl ManagedQueryRunner {
    /// Creates a runner against the given engine and storage backend.
    #[must_use]
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        storage: Arc<dyn StorageBackend>,
        config: PipelineConfig,
    ) -> Self {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_base());
        Self {
            engine,
            storage,
            config,
            retry,
        }
    }

    /// Executes `sql`, returning the base file name of the filtered extract.
    ///
    /// # Errors
    ///
    /// - `Error::Timeout` once the overall poll deadline elapses
    /// - `Error::NoData` if the result set has two rows or fewer
    /// - `Error::QueryExecution` if the engine reports failure or cancellation
    pub async fn run(&self, sql: &str) -> Result<String> {
        let output_location = format!("s3://{}/{FILTER_PREFIX}", self.config.bucket);
        let execution_id = self
            .retry
            .run("start_query", || {
                self.engine
                    .start_query(sql, &self.config.database, &output_location)
            })
            .await?;
        tracing::info!(execution_id = %execution_id, "managed query submitted");

        let status = self.poll_to_terminal(&execution_id).await?;
        match status.state {
            QueryState::Succeeded => {}
            QueryState::Failed | QueryState::Cancelled => {
                return Err(Error::query_execution(
                    status.reason.unwrap_or_else(|| "no cause reported".to_string()),
                ));
            }
            QueryState::Queued | QueryState::Running => {
                unreachable!("poll_to_terminal only returns terminal states")
            }
        }

        let row_count = self
            .retry
            .run("result_row_count", || {
                self.engine.result_row_count(&execution_id)
            })
            .await?;
        // Header plus at most one row means the filters matched nothing.
        if row_count <= 2 {
            return Err(Error::NoData);
        }

        let objects = self.storage.list(FILTER_PREFIX).await?;
        let key = select_newest_result(objects)?;
        Ok(ObjectPaths::filtered_base_name(&key).to_string())
    }

    /// Polls the execution on a fixed interval until terminal, bounded by
    /// the configured overall deadline.
    async fn poll_to_terminal(&self, execution_id: &str) -> Result<crate::clients::QueryStatus> {
        let deadline = Instant::now() + self.config.poll_timeout();
        loop {
            let status = self
                .retry
                .run("poll_query", || self.engine.poll(execution_id))
                .await?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    message: format!(
                        "query {execution_id} still {state:?} after {secs}s",
                        state = status.state,
                        secs = self.config.poll_timeout_secs
                    ),
                });
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

/// Picks the newest non-sidecar object from a `filter/` listing.
///
/// Objects are ordered by `last_modified` descending; if the newest key is a
/// metadata sidecar the next one wins.
///
/// # Errors
///
/// Returns `Error::QueryExecution` if the listing holds no result object.
pub fn select_newest_result(mut objects: Vec<ObjectMeta>) -> Result<String> {
    objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    let mut candidates = objects.into_iter();
    let newest = candidates
        .next()
        .ok_or_else(|| Error::query_execution("query produced no output objects"))?;
    if !paths::is_metadata_sidecar(&newest.path) {
        return Ok(newest.path);
    }
    candidates
        .next()
        .map(|meta| meta.path)
        .ok_or_else(|| Error::query_execution("query output holds only a metadata sidecar"))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use pulse_core::{MemoryBackend, WritePrecondition};

    use super::*;
    use crate::clients::QueryStatus;
    use crate::clients::scripted::ScriptedQueryEngine;

    fn meta(path: &str, age_secs: i64) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: 1,
            version: "1".to_string(),
            last_modified: Some(Utc::now() - ChronoDuration::seconds(age_secs)),
        }
    }

    fn status(state: QueryState) -> QueryStatus {
        QueryStatus {
            state,
            reason: None,
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            poll_interval_secs: 3,
            poll_timeout_secs: 30,
            retry_base_millis: 1,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn newest_object_wins() {
        let selected =
            select_newest_result(vec![meta("filter/t1.csv", 60), meta("filter/t2.csv", 0)])
                .unwrap();
        assert_eq!(selected, "filter/t2.csv");
    }

    #[test]
    fn metadata_sidecar_is_skipped_even_when_newest() {
        // Newest-first order: t2.csv_metadata, t2.csv, t1.csv.
        let selected = select_newest_result(vec![
            meta("filter/t2.csv_metadata", 0),
            meta("filter/t2.csv", 1),
            meta("filter/t1.csv", 60),
        ])
        .unwrap();
        assert_eq!(selected, "filter/t2.csv");
    }

    #[test]
    fn empty_listing_is_an_error() {
        assert!(select_newest_result(vec![]).is_err());
    }

    #[test]
    fn sidecar_only_listing_is_an_error() {
        assert!(select_newest_result(vec![meta("filter/t1.csv_metadata", 0)]).is_err());
    }

    async fn storage_with(keys: &[&str]) -> Arc<MemoryBackend> {
        let storage = Arc::new(MemoryBackend::new());
        for key in keys {
            storage
                .put(key, Bytes::from("x"), WritePrecondition::None)
                .await
                .unwrap();
        }
        storage
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_to_success_and_returns_base_name() {
        let engine = Arc::new(ScriptedQueryEngine::new(
            [
                status(QueryState::Queued),
                status(QueryState::Running),
                status(QueryState::Succeeded),
            ],
            10,
        ));
        let storage = storage_with(&["filter/east_filtered.csv"]).await;
        let runner = ManagedQueryRunner::new(engine.clone(), storage, test_config());

        let object = runner.run("SELECT * FROM survey_data;").await.unwrap();
        assert_eq!(object, "east_filtered.csv");
        assert_eq!(engine.submitted(), vec!["SELECT * FROM survey_data;"]);
    }

    #[tokio::test(start_paused = true)]
    async fn two_row_result_is_no_data() {
        let engine = Arc::new(ScriptedQueryEngine::new([status(QueryState::Succeeded)], 2));
        let storage = storage_with(&["filter/out.csv"]).await;
        let runner = ManagedQueryRunner::new(engine, storage, test_config());

        let err = runner.run("SELECT * FROM survey_data;").await.unwrap_err();
        assert!(matches!(err, Error::NoData));
    }

    #[tokio::test(start_paused = true)]
    async fn three_row_result_is_not_no_data() {
        let engine = Arc::new(ScriptedQueryEngine::new([status(QueryState::Succeeded)], 3));
        let storage = storage_with(&["filter/out.csv"]).await;
        let runner = ManagedQueryRunner::new(engine, storage, test_config());

        assert_eq!(runner.run("SELECT * FROM survey_data;").await.unwrap(), "out.csv");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_execution_carries_engine_cause() {
        let engine = Arc::new(ScriptedQueryEngine::new(
            [QueryStatus {
                state: QueryState::Failed,
                reason: Some("SYNTAX_ERROR at line 1".to_string()),
            }],
            0,
        ));
        let storage = storage_with(&[]).await;
        let runner = ManagedQueryRunner::new(engine, storage, test_config());

        let err = runner.run("SELECT;").await.unwrap_err();
        match err {
            Error::QueryExecution { cause } => assert!(cause.contains("SYNTAX_ERROR")),
            other => panic!("expected QueryExecution, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_poll_is_cut_off_by_deadline() {
        let engine = Arc::new(ScriptedQueryEngine::new([status(QueryState::Running)], 0));
        let storage = storage_with(&[]).await;
        let runner = ManagedQueryRunner::new(engine, storage, test_config());

        let err = runner.run("SELECT * FROM survey_data;").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
