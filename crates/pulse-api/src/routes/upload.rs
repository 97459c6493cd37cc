//! Multipart survey upload endpoints.
//!
//! The browser uploads directly against signed part URLs; the API only
//! brokers the session. The upload always targets the fixed raw survey key,
//! so a new upload replaces the previous dataset.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use pulse_core::storage::CompletedPart;
use pulse_core::{ObjectPaths, UploadId};

use crate::error::ApiResult;
use crate::server::AppState;

/// Expiry for signed part URLs.
const PART_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Upload routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/initiate-upload", post(initiate_upload))
        .route("/generate-presigned-urls", post(generate_presigned_urls))
        .route("/complete-upload", post(complete_upload))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateUploadResponse {
    upload_id: UploadId,
    file_name: String,
}

/// `POST /initiate-upload`
///
/// Opens a multipart upload session against the configured raw survey key.
async fn initiate_upload(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<InitiateUploadResponse>> {
    let file_name = state.config.pipeline.upload_file_name.clone();
    let upload_id = state
        .storage
        .create_multipart_upload(
            &ObjectPaths::raw(&file_name),
            &state.config.pipeline.upload_content_type,
        )
        .await?;
    tracing::info!(upload_id = %upload_id, file_name = %file_name, "multipart upload opened");
    Ok(Json(InitiateUploadResponse {
        upload_id,
        file_name,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePresignedUrlsRequest {
    upload_id: UploadId,
    parts: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresignedPart {
    part_number: u32,
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePresignedUrlsResponse {
    presigned_urls: Vec<PresignedPart>,
}

/// `POST /generate-presigned-urls`
///
/// Mints one signed write URL per requested part number. An unknown upload
/// id maps to 404.
async fn generate_presigned_urls(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GeneratePresignedUrlsRequest>,
) -> ApiResult<Json<GeneratePresignedUrlsResponse>> {
    let path = ObjectPaths::raw(&state.config.pipeline.upload_file_name);
    let mut presigned_urls = Vec::with_capacity(request.parts.len());
    for part_number in request.parts {
        let url = state
            .storage
            .upload_part_url(&path, &request.upload_id, part_number, PART_URL_EXPIRY)
            .await?;
        presigned_urls.push(PresignedPart { part_number, url });
    }
    Ok(Json(GeneratePresignedUrlsResponse { presigned_urls }))
}

#[derive(Debug, Deserialize)]
struct CompletedPartBody {
    #[serde(rename = "PartNumber")]
    part_number: u32,
    #[serde(rename = "ETag")]
    etag: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteUploadRequest {
    upload_id: UploadId,
    parts: Vec<CompletedPartBody>,
}

#[derive(Debug, Serialize)]
struct CompleteUploadResponse {
    message: String,
}

/// `POST /complete-upload`
///
/// Finalizes the session. Part integrity rejections (wrong order, stale
/// ETags) map to 400.
async fn complete_upload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompleteUploadRequest>,
) -> ApiResult<Json<CompleteUploadResponse>> {
    let path = ObjectPaths::raw(&state.config.pipeline.upload_file_name);
    let parts: Vec<CompletedPart> = request
        .parts
        .into_iter()
        .map(|p| CompletedPart {
            part_number: p.part_number,
            etag: p.etag,
        })
        .collect();
    state
        .storage
        .complete_multipart_upload(&path, &request.upload_id, &parts)
        .await?;
    tracing::info!(upload_id = %request.upload_id, "multipart upload completed");
    Ok(Json(CompleteUploadResponse {
        message: "Upload completed successfully".to_string(),
    }))
}
