//! # pulse-flow
//!
//! Pipeline orchestration for the Pulse survey insight pipeline.
//!
//! A job moves through a fixed five-stage sequence:
//!
//! 1. **Validate** the natural-language query against the survey domain
//! 2. **Filter** the ingested data via the managed query engine
//! 3. **Cluster** free-text comments in an external batch-processing job
//! 4. **Synthesize** insights from cluster representatives via the LLM
//! 5. **Report** terminal status through the job store
//!
//! The external services stay behind seams ([`clients::QueryEngine`],
//! [`clients::TextModel`], [`clients::ClusterProcessor`]); this crate owns
//! the state machine, the stage logic, and the per-job write-ahead record.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod clients;
pub mod cluster;
pub mod error;
pub mod filter;
pub mod job;
pub mod query_runner;
pub mod retry;
pub mod runner;
pub mod sql;
pub mod state;
pub mod store;
pub mod synthesizer;
pub mod validator;

pub use error::{Error, Result};
pub use filter::{FilterSet, FilterValue};
pub use job::{PipelineJob, StageKey};
pub use runner::PipelineRunner;
pub use state::{JobEvent, JobState};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::filter::{FilterSet, FilterValue};
    pub use crate::job::PipelineJob;
    pub use crate::runner::PipelineRunner;
    pub use crate::state::{JobEvent, JobState};
}
