//! The job state machine.
//!
//! The managed workflow service becomes an explicit enumerated state type
//! with a pure transition function; the orchestrator drives it and persists
//! every transition through the job store.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Job state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Created, query validated, not yet running.
    Pending,
    /// The managed query stage is executing.
    RunningQuery,
    /// The external clustering job is executing.
    Clustering,
    /// The insight synthesis stage is executing.
    Synthesizing,
    /// All stages completed; the insight report is available.
    Succeeded,
    /// A stage faulted; the job carries the failure message and cause.
    Failed,
}

/// Events that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The orchestrator picked the job up.
    Started,
    /// The managed query completed and an extract was located.
    QueryCompleted,
    /// The clustering job wrote its extract.
    ClusteringCompleted,
    /// The synthesis stage produced an insight report.
    SynthesisCompleted,
    /// Any stage faulted.
    StageFailed,
}

impl JobState {
    /// Returns true if no further transitions occur from this state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Applies an event, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` for an event the current
    /// state does not accept.
    pub fn apply(self, event: JobEvent) -> Result<Self> {
        let next = match (self, event) {
            (Self::Pending, JobEvent::Started) => Self::RunningQuery,
            (Self::RunningQuery, JobEvent::QueryCompleted) => Self::Clustering,
            (Self::Clustering, JobEvent::ClusteringCompleted) => Self::Synthesizing,
            (Self::Synthesizing, JobEvent::SynthesisCompleted) => Self::Succeeded,
            // Every non-terminal state can fail.
            (
                Self::Pending | Self::RunningQuery | Self::Clustering | Self::Synthesizing,
                JobEvent::StageFailed,
            ) => Self::Failed,
            (from, event) => {
                return Err(Error::InvalidStateTransition {
                    from: from.to_string(),
                    to: format!("{event:?}"),
                });
            }
        };
        Ok(next)
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::RunningQuery => write!(f, "RUNNING_QUERY"),
            Self::Clustering => write!(f, "CLUSTERING"),
            Self::Synthesizing => write!(f, "SYNTHESIZING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}
