//! Error types for the pipeline domain.

use pulse_core::JobId;

/// The result type used throughout `pulse-flow`.
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed user-facing message attached to every failed job.
///
/// The orchestrator does not distinguish error causes to the client beyond
/// this single message; the structured cause is carried separately for
/// observability.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "filters returned no data, or an internal error occurred; please retry.";

/// User-facing guidance when a filter combination matches no data.
pub const NO_DATA_MESSAGE: &str =
    "The filters you selected have no data. Please select different filters to get insights.";

/// Errors that can occur in pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query was rejected by the validation gate.
    #[error("query rejected: {reason}")]
    Validation {
        /// Why the query was rejected.
        reason: String,
    },

    /// The query/filter combination yielded no usable rows.
    #[error("query returned no data")]
    NoData,

    /// The managed query engine reported failure or cancellation.
    #[error("query execution failed: {cause}")]
    QueryExecution {
        /// The engine's reported cause.
        cause: String,
    },

    /// The clustered extract was empty or degenerate.
    #[error("insufficient data for synthesis: {reason}")]
    InsufficientData {
        /// What made the extract unusable.
        reason: String,
    },

    /// The model output could not be parsed into the expected shape.
    #[error("model output not well-formed: {reason}")]
    ModelOutput {
        /// What was wrong with the output.
        reason: String,
    },

    /// An external call or poll loop exceeded its deadline.
    #[error("timed out: {message}")]
    Timeout {
        /// Description of the operation that timed out.
        message: String,
    },

    /// An invalid state transition was attempted.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    /// A job record was not found.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// The job ID that was looked up.
        job_id: JobId,
    },

    /// A concurrent update won the CAS race for a job record.
    #[error("job record conflict: {job_id}")]
    JobConflict {
        /// The job whose record was concurrently modified.
        job_id: JobId,
    },

    /// An external service call failed.
    #[error("external service error: {message}")]
    External {
        /// Description of the failure.
        message: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from pulse-core.
    #[error("core error: {0}")]
    Core(#[from] pulse_core::Error),
}

impl Error {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a query-execution error carrying the engine's cause.
    #[must_use]
    pub fn query_execution(cause: impl Into<String>) -> Self {
        Self::QueryExecution {
            cause: cause.into(),
        }
    }

    /// Creates an insufficient-data error.
    #[must_use]
    pub fn insufficient_data(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }

    /// Creates a model-output error.
    #[must_use]
    pub fn model_output(reason: impl Into<String>) -> Self {
        Self::ModelOutput {
            reason: reason.into(),
        }
    }

    /// Creates an external-service error.
    #[must_use]
    pub fn external(message: impl Into<String>) -> Self {
        Self::External {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns the message shown to the client for this failure.
    ///
    /// No-data conditions get the filter guidance; everything else gets the
    /// single generic message.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoData | Self::InsufficientData { .. } => NO_DATA_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}
