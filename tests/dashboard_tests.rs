use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use spindle::dashboard::{index_handler, status_handler, submit_job_handler, DashboardState};
use spindle::scheduler::Hub;

/// Create a test app wired to the real dashboard handlers
fn create_test_app(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/jobs", post(submit_job_handler))
        .with_state(state)
}

fn create_test_state() -> DashboardState {
    DashboardState {
        hub: Arc::new(Hub::new(Duration::from_secs(5))),
    }
}

#[tokio::test]
async fn test_index_returns_html() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_status_endpoint_reports_counters() {
    let state = create_test_state();
    let hub = Arc::clone(&state.hub);
    let app = create_test_app(state);

    hub.add_job(spindle::scheduler::Job::new_auto_id(
        chrono::Utc::now() + chrono::TimeDelta::seconds(60),
        b"x".to_vec(),
    ))
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let status: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status["spoke_count"], 1);
    assert_eq!(status["pending_jobs"], 1);
    assert_eq!(status["reserved_jobs"], 0);
    assert_eq!(status["removed_jobs"], 0);
    assert_eq!(status["spoke_depths"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_job_lands_in_the_hub() {
    let state = create_test_state();
    let hub = Arc::clone(&state.hub);
    let app = create_test_app(state);

    let payload = json!({
        "delay_ms": -1000,
        "body": "dashboard job",
        "priority": 3,
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/jobs")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let submitted: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(submitted["success"], true);
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    // The job was overdue, so it is immediately deliverable.
    let job = hub.next().expect("submitted job should be ready");
    assert_eq!(job.id(), job_id);
    assert_eq!(job.body(), b"dashboard job");
    assert_eq!(job.priority(), 3);
}
