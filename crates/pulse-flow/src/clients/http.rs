//! HTTP clients for the managed service gateways.
//!
//! Deployments front the query engine and the inference endpoint with thin
//! JSON gateways; these clients assemble the payloads and map failures into
//! the pipeline error taxonomy. Both use a bounded request timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pulse_core::JobId;

use super::{ClusterProcessor, QueryEngine, QueryStatus, TextModel};
use crate::error::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// The clustering gateway blocks until the batch job finishes.
const CLUSTER_REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn joined(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);
    format!("{status}: {message}")
}

// ============================================================================
// Query engine gateway
// ============================================================================

#[derive(Debug, Serialize)]
struct StartQueryRequest<'a> {
    sql: &'a str,
    database: &'a str,
    output_location: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartQueryResponse {
    execution_id: String,
}

#[derive(Debug, Deserialize)]
struct RowCountResponse {
    row_count: u64,
}

/// HTTP client for the managed query engine gateway.
#[derive(Debug, Clone)]
pub struct HttpQueryEngine {
    base_url: String,
    client: reqwest::Client,
}

impl HttpQueryEngine {
    /// Creates a new client targeting the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: build_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

#[async_trait]
impl QueryEngine for HttpQueryEngine {
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(joined(&self.base_url, "queries"))
            .json(&StartQueryRequest {
                sql,
                database,
                output_location,
            })
            .send()
            .await
            .map_err(|e| Error::external(format!("query submission failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::external(format!(
                "query submission rejected: {}",
                error_body(response).await
            )));
        }
        let body: StartQueryResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(format!("invalid start-query response: {e}")))?;
        Ok(body.execution_id)
    }

    async fn poll(&self, execution_id: &str) -> Result<QueryStatus> {
        let response = self
            .client
            .get(joined(&self.base_url, &format!("queries/{execution_id}")))
            .send()
            .await
            .map_err(|e| Error::external(format!("query poll failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::external(format!(
                "query poll rejected: {}",
                error_body(response).await
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::serialization(format!("invalid query status: {e}")))
    }

    async fn result_row_count(&self, execution_id: &str) -> Result<u64> {
        let response = self
            .client
            .get(joined(
                &self.base_url,
                &format!("queries/{execution_id}/row-count"),
            ))
            .send()
            .await
            .map_err(|e| Error::external(format!("row count fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::external(format!(
                "row count fetch rejected: {}",
                error_body(response).await
            )));
        }
        let body: RowCountResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(format!("invalid row count response: {e}")))?;
        Ok(body.row_count)
    }
}

// ============================================================================
// Inference gateway
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model_id: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// HTTP client for the managed text-generation endpoint.
#[derive(Debug, Clone)]
pub struct HttpTextModel {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTextModel {
    /// Creates a new client targeting the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: build_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

#[async_trait]
impl TextModel for HttpTextModel {
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(joined(&self.base_url, "generate"))
            .json(&GenerateRequest {
                model_id,
                prompt,
                max_tokens: 4000,
                temperature: 0.5,
            })
            .send()
            .await
            .map_err(|e| Error::external(format!("model invocation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::external(format!(
                "model invocation rejected: {}",
                error_body(response).await
            )));
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(format!("invalid generate response: {e}")))?;
        Ok(body.text.trim().to_string())
    }
}

// ============================================================================
// Clustering gateway
// ============================================================================

#[derive(Debug, Serialize)]
struct ClusterRequest<'a> {
    job_id: JobId,
    object_name: &'a str,
}

/// HTTP client for the batch clustering gateway.
///
/// The gateway starts the processing job and responds once the job-scoped
/// clustered extract has been written.
#[derive(Debug, Clone)]
pub struct HttpClusterProcessor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClusterProcessor {
    /// Creates a new client targeting the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: build_client(CLUSTER_REQUEST_TIMEOUT),
        }
    }
}

#[async_trait]
impl ClusterProcessor for HttpClusterProcessor {
    async fn run(&self, job_id: JobId, object_name: &str) -> Result<()> {
        let response = self
            .client
            .post(joined(&self.base_url, "processing-jobs"))
            .json(&ClusterRequest { job_id, object_name })
            .send()
            .await
            .map_err(|e| Error::external(format!("clustering job failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::external(format!(
                "clustering job rejected: {}",
                error_body(response).await
            )));
        }
        Ok(())
    }
}
