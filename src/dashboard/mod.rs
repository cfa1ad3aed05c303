use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::scheduler::{Hub, Job};

#[derive(Clone)]
pub struct DashboardState {
    pub hub: Arc<Hub>,
}

#[derive(Deserialize)]
pub struct SubmitJobRequest {
    /// Milliseconds from now until the job becomes deliverable.
    delay_ms: i64,
    body: String,
    priority: Option<i32>,
    ttr_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct SubmitJobResponse {
    success: bool,
    job_id: Option<String>,
    error: Option<String>,
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState) {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/jobs", post(submit_job_handler))
        .layer(cors)
        .with_state(state);

    tracing::info!(addr = %addr, "starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(addr = %addr, error = %err, "failed to bind dashboard server");
            return;
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "dashboard server failed");
    }
}

pub async fn index_handler() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

pub async fn status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.hub.status())
}

pub async fn submit_job_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<SubmitJobRequest>,
) -> impl IntoResponse {
    let trigger_at = Utc::now() + TimeDelta::milliseconds(payload.delay_ms);
    let mut job = Job::new_auto_id(trigger_at, payload.body.into_bytes());
    job.set_opts(
        payload.priority.unwrap_or(0),
        std::time::Duration::from_millis(payload.ttr_ms.unwrap_or(0)),
    );
    let job_id = job.id().to_string();

    match state.hub.add_job(job) {
        Ok(()) => (
            StatusCode::OK,
            Json(SubmitJobResponse {
                success: true,
                job_id: Some(job_id),
                error: None,
            }),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SubmitJobResponse {
                success: false,
                job_id: None,
                error: Some(err.to_string()),
            }),
        ),
    }
}
