//! # pulse-api
//!
//! HTTP composition layer for the Pulse survey insight pipeline.
//!
//! This crate is a **thin composition layer** with no domain policy. All
//! pipeline logic lives in `pulse-flow`; this crate wires it to the process
//! environment and exposes the public endpoints:
//!
//! ```text
//! GET  /health                   - Health check
//! POST /initiate-upload          - Open a multipart survey upload
//! POST /generate-presigned-urls  - Mint per-part signed upload URLs
//! POST /complete-upload          - Finalize a multipart upload
//! POST /process-query            - Validate a query and start a pipeline job
//! GET  /check-status?jobId=<id>  - Report a job's terminal or in-flight state
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, Server};
