//! Query submission endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use pulse_core::JobId;
use pulse_flow::FilterSet;

use crate::error::ApiResult;
use crate::server::AppState;

/// Query routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/process-query", post(process_query))
}

#[derive(Debug, Deserialize)]
struct ProcessQueryRequest {
    query: String,
    filters: FilterSet,
}

#[derive(Debug, Serialize)]
struct ProcessQueryResponse {
    job_id: JobId,
    /// Execution name of the started job, kept in the source wire shape.
    execution_arn: String,
}

/// `POST /process-query`
///
/// Gates the query, creates the job, and starts it in the background. A
/// rejected query maps to 400 with the fixed guidance message; the caller
/// polls `/check-status` for everything after that.
async fn process_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessQueryRequest>,
) -> ApiResult<Json<ProcessQueryResponse>> {
    let job_id = state.runner.start(&request.query, request.filters).await?;
    Ok(Json(ProcessQueryResponse {
        job_id,
        execution_arn: job_id.execution_name(),
    }))
}
