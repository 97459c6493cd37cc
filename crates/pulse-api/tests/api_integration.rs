//! Integration tests driving the public router over scripted pipeline fakes.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use serde_json::{Value, json};
use tower::ServiceExt;

use pulse_api::config::Config;
use pulse_api::server::{AppState, router};
use pulse_core::{MemoryBackend, StorageBackend, WritePrecondition};
use pulse_flow::clients::scripted::{
    FailingClusterProcessor, InlineClusterProcessor, ScriptedQueryEngine, ScriptedTextModel,
};
use pulse_flow::clients::{QueryState, QueryStatus};
use pulse_flow::error::GENERIC_FAILURE_MESSAGE;
use pulse_flow::store::{JobStore, StorageJobStore};
use pulse_flow::validator::INVALID_QUERY_MESSAGE;
use pulse_flow::{FilterSet, JobState, PipelineJob, PipelineRunner};

fn report_json() -> String {
    json!({
        "insights": [{
            "insight": "Scheduling pressure drives burnout",
            "recommendation": "Pilot protected rest windows",
            "sample_row": "id: 1; comment_burnout_reason: back-to-back shifts"
        }],
        "summary": "Scheduling dominates the feedback."
    })
    .to_string()
}

fn clustered_extract() -> Bytes {
    Bytes::from(
        "id,comment_burnout_reason,cluster,is_unique\n\
         1,back-to-back shifts,0,False\n\
         2,more of the same,0,False\n\
         3,no parking at night,-1,True\n",
    )
}

struct Harness {
    app: Router,
    backend: Arc<MemoryBackend>,
}

fn harness(model_responses: Vec<String>, row_count: u64, cluster_ok: bool) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let storage: Arc<dyn StorageBackend> = backend.clone();

    let engine = Arc::new(ScriptedQueryEngine::new(
        [QueryStatus {
            state: QueryState::Succeeded,
            reason: None,
        }],
        row_count,
    ));
    let model = Arc::new(ScriptedTextModel::new(model_responses));
    let store: Arc<dyn JobStore> = Arc::new(StorageJobStore::new(storage.clone()));
    let cluster: Arc<dyn pulse_flow::clients::ClusterProcessor> = if cluster_ok {
        Arc::new(InlineClusterProcessor::new(storage.clone(), clustered_extract()))
    } else {
        Arc::new(FailingClusterProcessor)
    };

    let mut config = Config::default();
    config.pipeline.retry_base_millis = 1;
    config.pipeline.poll_timeout_secs = 10;

    let runner = PipelineRunner::new(
        storage.clone(),
        engine,
        model,
        cluster,
        store,
        config.pipeline.clone(),
    );
    let state = Arc::new(AppState::new(config, storage, runner));
    Harness {
        app: router(state),
        backend,
    }
}

async fn seed_filtered_extract(backend: &MemoryBackend) {
    backend
        .put(
            "filter/east_filtered.csv",
            Bytes::from("header\nrow\nrow\n"),
            WritePrecondition::None,
        )
        .await
        .unwrap();
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send(app, request).await
}

/// Polls the status endpoint until the job reaches a terminal state.
async fn wait_for_terminal(app: &Router, job_id: &str) -> (StatusCode, Value) {
    for _ in 0..200 {
        let (status, body) = get(app, &format!("/check-status?jobId={job_id}")).await;
        let state = body.get("status").and_then(Value::as_str).unwrap_or("");
        if state == "SUCCEEDED" || state == "FAILED" || status != StatusCode::OK {
            return (status, body);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn health_answers_ok() {
    let h = harness(vec![], 0, true);
    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn multipart_upload_round_trip() {
    let h = harness(vec![], 0, true);

    let (status, body) = post_json(&h.app, "/initiate-upload", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileName"], "survey.csv");
    let upload_id = pulse_core::UploadId::new(body["uploadId"].as_str().unwrap());

    let (status, body) = post_json(
        &h.app,
        "/generate-presigned-urls",
        json!({"uploadId": upload_id.as_str(), "parts": [1, 2]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let urls = body["presignedUrls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["partNumber"], 1);
    assert!(urls[0]["url"].as_str().unwrap().contains("survey.csv"));

    // Simulate the browser's direct part writes against the store.
    let etag1 = h
        .backend
        .put_part(&upload_id, 1, Bytes::from("id,location\n"))
        .unwrap();
    let etag2 = h.backend.put_part(&upload_id, 2, Bytes::from("1,East\n")).unwrap();

    let (status, body) = post_json(
        &h.app,
        "/complete-upload",
        json!({
            "uploadId": upload_id.as_str(),
            "parts": [
                {"PartNumber": 1, "ETag": etag1},
                {"PartNumber": 2, "ETag": etag2},
            ],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Upload completed successfully");

    let raw = h.backend.get("raw/survey.csv").await.unwrap();
    assert_eq!(raw, Bytes::from("id,location\n1,East\n"));
}

#[tokio::test]
async fn presigned_urls_for_unknown_upload_are_404() {
    let h = harness(vec![], 0, true);
    let (status, body) = post_json(
        &h.app,
        "/generate-presigned-urls",
        json!({"uploadId": "no-such-session", "parts": [1]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn complete_upload_with_stale_etag_is_400() {
    let h = harness(vec![], 0, true);

    let (_, body) = post_json(&h.app, "/initiate-upload", json!({})).await;
    let upload_id = pulse_core::UploadId::new(body["uploadId"].as_str().unwrap());
    h.backend
        .put_part(&upload_id, 1, Bytes::from("data"))
        .unwrap();

    let (status, body) = post_json(
        &h.app,
        "/complete-upload",
        json!({
            "uploadId": upload_id.as_str(),
            "parts": [{"PartNumber": 1, "ETag": "bogus"}],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn rejected_query_is_400_with_guidance() {
    let h = harness(vec!["Invalid".to_string()], 25, true);
    let (status, body) = post_json(
        &h.app,
        "/process-query",
        json!({"query": "What is the weather today?", "filters": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], INVALID_QUERY_MESSAGE);
}

#[tokio::test]
async fn accepted_query_runs_to_succeeded_status() {
    let h = harness(vec!["Valid".to_string(), report_json()], 25, true);
    seed_filtered_extract(&h.backend).await;

    let (status, body) = post_json(
        &h.app,
        "/process-query",
        json!({
            "query": "What is employee sentiment in East?",
            "filters": [{"location": ["East"]}],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(
        body["execution_arn"].as_str().unwrap(),
        format!("processing-job-{job_id}")
    );

    let (status, body) = wait_for_terminal(&h.app, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCEEDED");
    assert!(!body["output"]["insights"].as_array().unwrap().is_empty());
    assert!(!body["output"]["summary"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn failed_job_reports_200_with_error_fields() {
    let h = harness(vec!["Valid".to_string(), report_json()], 25, false);
    seed_filtered_extract(&h.backend).await;

    let (status, body) = post_json(
        &h.app,
        "/process-query",
        json!({"query": "sentiment?", "filters": []}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = wait_for_terminal(&h.app, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "FAILED");
    assert_eq!(body["error"], GENERIC_FAILURE_MESSAGE);
    assert!(body["cause"].as_str().unwrap().contains("clustering"));
    assert_eq!(body["job_id"], job_id);
}

#[tokio::test]
async fn status_requires_a_job_id() {
    let h = harness(vec![], 0, true);

    let (status, body) = get(&h.app, "/check-status").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing jobId parameter");

    let (status, _) = get(&h.app, "/check-status?jobId=not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_for_unknown_job_is_404() {
    let h = harness(vec![], 0, true);
    let missing = pulse_core::JobId::generate();
    let (status, body) = get(&h.app, &format!("/check-status?jobId={missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn succeeded_job_without_output_is_500() {
    let h = harness(vec![], 0, true);

    // A terminal record missing its synthesis result is a pipeline defect.
    let store = StorageJobStore::new(h.backend.clone() as Arc<dyn StorageBackend>);
    let mut job = PipelineJob::new(pulse_core::JobId::generate(), "q", FilterSet::empty());
    job.state = JobState::Succeeded;
    store.create(&job).await.unwrap();

    let (status, body) = get(&h.app, &format!("/check-status?jobId={}", job.job_id)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "malformed pipeline output");
}
