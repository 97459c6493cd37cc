//! `pulse-api` binary entrypoint.
//!
//! Loads configuration from environment variables, wires the managed-service
//! gateways, and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use pulse_api::config::Config;
use pulse_api::server::{AppState, Server};
use pulse_core::observability::{LogFormat, init_logging};
use pulse_core::storage::{MemoryBackend, StorageBackend};
use pulse_flow::clients::http::{HttpClusterProcessor, HttpQueryEngine, HttpTextModel};
use pulse_flow::store::{JobStore, StorageJobStore};
use pulse_flow::PipelineRunner;

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

fn required_url(value: Option<String>, name: &str) -> Result<String> {
    value.ok_or_else(|| anyhow::anyhow!("{name} is required"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(choose_log_format(&config));

    // The in-memory backend is the only storage wiring in this build; real
    // deployments sit behind an object-store gateway.
    if !config.debug {
        anyhow::bail!("PULSE_DEBUG=true is required: only in-memory storage is wired");
    }
    tracing::warn!("using in-memory storage backend (debug only)");
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());

    let query_engine_url = required_url(config.query_engine_url.clone(), "PULSE_QUERY_ENGINE_URL")?;
    let inference_url = required_url(config.inference_url.clone(), "PULSE_INFERENCE_URL")?;
    let cluster_url = required_url(config.cluster_url.clone(), "PULSE_CLUSTER_URL")?;

    let store: Arc<dyn JobStore> = Arc::new(StorageJobStore::new(storage.clone()));
    let runner = PipelineRunner::new(
        storage.clone(),
        Arc::new(HttpQueryEngine::new(query_engine_url)),
        Arc::new(HttpTextModel::new(inference_url)),
        Arc::new(HttpClusterProcessor::new(cluster_url)),
        store,
        config.pipeline.clone(),
    );

    let server = Server::new(AppState::new(config, storage, runner));
    server.serve().await?;
    Ok(())
}
