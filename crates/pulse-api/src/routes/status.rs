//! Job status endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use pulse_core::JobId;
use pulse_flow::error::GENERIC_FAILURE_MESSAGE;
use pulse_flow::{JobState, StageKey};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Status routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/check-status", get(check_status))
}

#[derive(Debug, Deserialize)]
struct StatusParams {
    #[serde(rename = "jobId")]
    job_id: Option<String>,
}

/// `GET /check-status?jobId=<id>`
///
/// Reports the job's state. A failed job still answers 200 with the error
/// fields in the body, matching what the frontend expects. A job marked
/// `SUCCEEDED` without a synthesis result is a pipeline defect and answers
/// 500.
async fn check_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> ApiResult<Response> {
    let raw_id = params
        .job_id
        .ok_or_else(|| ApiError::bad_request("Missing jobId parameter"))?;
    let job_id: JobId = raw_id
        .parse()
        .map_err(|e: pulse_core::Error| ApiError::bad_request(e.to_string()))?;

    let job = state.runner.job(job_id).await?;
    let response = match job.state {
        JobState::Succeeded => {
            let output = job
                .stage_result(StageKey::SynthesisResult)
                .ok_or_else(|| ApiError::internal("malformed pipeline output"))?;
            Json(json!({
                "status": job.state,
                "output": output,
            }))
            .into_response()
        }
        JobState::Failed => {
            let (error, cause) = job.failure.as_ref().map_or_else(
                || (GENERIC_FAILURE_MESSAGE.to_string(), String::new()),
                |f| (f.message.clone(), f.cause.clone()),
            );
            Json(json!({
                "job_id": job.job_id,
                "status": job.state,
                "error": error,
                "cause": cause,
            }))
            .into_response()
        }
        _ => Json(json!({
            "job_id": job.job_id,
            "status": job.state,
        }))
        .into_response(),
    };
    Ok(response)
}
