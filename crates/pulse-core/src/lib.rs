//! # pulse-core
//!
//! Core abstractions for the Pulse survey insight pipeline.
//!
//! This crate provides the foundational types used across all Pulse components:
//!
//! - **Identifiers**: Strongly-typed job and upload-session IDs
//! - **Configuration**: Injected pipeline configuration (no ambient globals)
//! - **Storage**: Abstract object-store interface, including multipart uploads
//! - **Key Layout**: The fixed object-store prefixes used by every stage
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `pulse-core` is the only crate allowed to define shared primitives. The
//! pipeline stages (`pulse-flow`) and the HTTP surface (`pulse-api`) both
//! build on the contracts defined here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod id;
pub mod observability;
pub mod paths;
pub mod storage;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use id::{JobId, UploadId};
pub use observability::{LogFormat, init_logging};
pub use paths::ObjectPaths;
pub use storage::{
    CompletedPart, MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::id::{JobId, UploadId};
    pub use crate::paths::ObjectPaths;
    pub use crate::storage::{StorageBackend, WritePrecondition, WriteResult};
}
