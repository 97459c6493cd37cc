//! Injected pipeline configuration.
//!
//! Every stage takes its configuration as an explicit value; nothing in the
//! core or flow crates reads environment variables directly. The API binary
//! is the only place configuration is loaded from the process environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default poll interval for the managed query engine.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
/// Default overall deadline for a single managed query.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;
/// Default number of attempts for external-service calls.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default base backoff between retry attempts.
const DEFAULT_RETRY_BASE_MILLIS: u64 = 250;

/// Configuration consumed by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Object store bucket identifier.
    pub bucket: String,
    /// Database the managed query engine runs against.
    pub database: String,
    /// Table holding the ingested survey data.
    pub table: String,
    /// Free-text comment columns clustered by the processing job.
    pub comment_columns: Vec<String>,
    /// Model identifier passed to the managed inference endpoint.
    pub model_id: String,
    /// Fixed file name for the raw survey upload.
    #[serde(default = "default_upload_file_name")]
    pub upload_file_name: String,
    /// Content type for the raw survey upload.
    #[serde(default = "default_upload_content_type")]
    pub upload_content_type: String,
    /// Seconds between managed-query state polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Overall deadline, in seconds, for a single managed query.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Attempts made for each external-service call before giving up.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base backoff between retry attempts, in milliseconds. Doubles per attempt.
    #[serde(default = "default_retry_base_millis")]
    pub retry_base_millis: u64,
}

fn default_upload_file_name() -> String {
    "survey.csv".to_string()
}

fn default_upload_content_type() -> String {
    "text/csv".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_poll_timeout_secs() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

const fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

const fn default_retry_base_millis() -> u64 {
    DEFAULT_RETRY_BASE_MILLIS
}

impl PipelineConfig {
    /// Returns the poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the overall poll deadline as a [`Duration`].
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Returns the base retry backoff as a [`Duration`].
    #[must_use]
    pub const fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_millis)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket: "survey-insights".to_string(),
            database: "survey".to_string(),
            table: "survey_data".to_string(),
            comment_columns: vec![
                "comment_reason_to_stay".to_string(),
                "comment_reason_to_leave".to_string(),
                "comment_well_being_at_work".to_string(),
                "comment_well_being_outside_work".to_string(),
                "comment_burnout_reason".to_string(),
                "comment_burnout_improvement".to_string(),
                "comment_what_is_important_for_us_to_know".to_string(),
            ],
            model_id: "survey-insights-v1".to_string(),
            upload_file_name: default_upload_file_name(),
            upload_content_type: default_upload_content_type(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_millis: DEFAULT_RETRY_BASE_MILLIS,
        }
    }
}
