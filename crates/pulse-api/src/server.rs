//! API server implementation.
//!
//! Wires the pipeline runner and storage backend into an axum router and
//! serves the public endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pulse_core::storage::StorageBackend;
use pulse_core::{Error, Result};
use pulse_flow::PipelineRunner;

use crate::config::{Config, CorsConfig};

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Storage backend holding uploads, extracts, and job records.
    pub storage: Arc<dyn StorageBackend>,
    /// The pipeline runner driving jobs end to end.
    pub runner: PipelineRunner,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .field("runner", &"<PipelineRunner>")
            .finish()
    }
}

impl AppState {
    /// Creates new application state.
    #[must_use]
    pub fn new(config: Config, storage: Arc<dyn StorageBackend>, runner: PipelineRunner) -> Self {
        Self {
            config,
            storage,
            runner,
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check that
/// doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Creates the router with all routes and middleware.
///
/// Used both by [`Server::serve`] and by integration tests driving the
/// router directly.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.cors);

    let mut router = Router::new()
        .route("/health", get(health))
        .merge(crate::routes::routes());

    if let Some(cors) = cors {
        router = router.layer(cors);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Builds the CORS layer from configuration. Returns `None` when CORS is
/// disabled (no allowed origins).
fn build_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if config.allowed_origins.is_empty() {
        return None;
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.max_age_seconds));

    let cors = if config.allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    };
    Some(cors)
}

/// The Pulse API server.
pub struct Server {
    state: Arc<AppState>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("state", &self.state).finish()
    }
}

impl Server {
    /// Creates a new server over the given state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Binds the HTTP listener and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn serve(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::internal(format!("failed to bind {addr}: {e}")))?;
        tracing::info!(%addr, "pulse-api listening");
        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| Error::internal(format!("server error: {e}")))
    }
}
