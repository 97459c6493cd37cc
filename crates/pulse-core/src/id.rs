//! Strongly-typed identifiers for Pulse entities.
//!
//! Job identity is generated once when a validated query starts execution and
//! is threaded through every stage: the orchestrator's execution name, the
//! job-scoped object keys, and the status lookup all derive from the same
//! [`JobId`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Prefix used to derive an execution name from a job id.
const EXECUTION_NAME_PREFIX: &str = "processing-job-";

/// A unique identifier for one end-to-end pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new unique job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a job ID from a raw UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the execution name for this job: `processing-job-<uuid>`.
    #[must_use]
    pub fn execution_name(&self) -> String {
        format!("{EXECUTION_NAME_PREFIX}{}", self.0)
    }

    /// Parses a job ID back out of an execution name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the name does not carry the
    /// `processing-job-` prefix or the suffix is not a UUID.
    pub fn from_execution_name(name: &str) -> Result<Self> {
        let suffix = name.strip_prefix(EXECUTION_NAME_PREFIX).ok_or_else(|| {
            Error::InvalidInput(format!("execution name missing prefix: {name}"))
        })?;
        suffix.parse()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid job id {s:?}: {e}")))
    }
}

/// An opaque multipart upload session identifier issued by the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Wraps a store-issued session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
