//! Seams for the managed services the pipeline calls into.
//!
//! Each external dependency sits behind a trait so the stage logic can be
//! exercised against scripted fakes:
//!
//! - [`QueryEngine`]: the managed SQL-over-object-storage service
//! - [`TextModel`]: the managed LLM inference endpoint
//! - [`ClusterProcessor`]: the managed batch job that clusters comments
//!
//! The HTTP implementations in [`http`] assemble the wire payloads; nothing
//! in this crate reimplements the services themselves.

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pulse_core::JobId;

use crate::error::Result;

/// Terminal and non-terminal states of a managed query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    /// Accepted, not yet running.
    Queued,
    /// Actively executing.
    Running,
    /// Completed successfully.
    Succeeded,
    /// The engine reported a failure.
    Failed,
    /// Cancelled by the engine or a user.
    Cancelled,
}

impl QueryState {
    /// Returns true if no further state changes will occur.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Snapshot of a query execution's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatus {
    /// Current state.
    pub state: QueryState,
    /// Engine-reported cause for `Failed`/`Cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The managed SQL query service.
#[async_trait]
pub trait QueryEngine: Send + Sync + 'static {
    /// Submits SQL for execution, directing output under `output_location`.
    ///
    /// Returns the engine's execution identifier.
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<String>;

    /// Fetches the current state of an execution.
    async fn poll(&self, execution_id: &str) -> Result<QueryStatus>;

    /// Returns the number of rows in a succeeded execution's result set,
    /// header included.
    async fn result_row_count(&self, execution_id: &str) -> Result<u64>;
}

/// The managed text-generation endpoint.
#[async_trait]
pub trait TextModel: Send + Sync + 'static {
    /// Generates a completion for the given prompt.
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String>;
}

/// The managed batch job that clusters comment text.
///
/// Reads the filtered extract named by `object_name`, embeds and clusters
/// the configured comment columns, and writes the job-scoped clustered
/// extract before returning.
#[async_trait]
pub trait ClusterProcessor: Send + Sync + 'static {
    /// Runs the clustering job for one pipeline job.
    async fn run(&self, job_id: JobId, object_name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(QueryState::Succeeded.is_terminal());
        assert!(QueryState::Failed.is_terminal());
        assert!(QueryState::Cancelled.is_terminal());
        assert!(!QueryState::Queued.is_terminal());
        assert!(!QueryState::Running.is_terminal());
    }

    #[test]
    fn query_state_wire_format_is_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&QueryState::Succeeded).unwrap(),
            "\"SUCCEEDED\""
        );
    }
}
