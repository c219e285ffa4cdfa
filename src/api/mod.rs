use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::JobError;
use crate::lifecycle::{JobLifecycleService, JobRecord, StartJobRequest, StopJobRequest};

/// Set to `true` on `/api/jobcards` responses served from a degraded catalog.
pub const CATALOG_UNAVAILABLE_HEADER: &str = "x-catalog-unavailable";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<JobLifecycleService>,
}

impl ApiState {
    pub fn new(service: Arc<JobLifecycleService>) -> Self {
        Self { service }
    }
}

#[derive(Serialize)]
struct JobResponse {
    message: &'static str,
    job: JobRecord,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = match self {
            JobError::Invalid(_) => StatusCode::BAD_REQUEST,
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::Conflict { .. } => StatusCode::CONFLICT,
            JobError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            JobError::InvariantViolation(_) | JobError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            JobError::NotFound(_) => "Job not found or already stopped".to_string(),
            ref other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        }

        (status, Json(MessageResponse { message })).into_response()
    }
}

impl From<JsonRejection> for JobError {
    fn from(rejection: JsonRejection) -> Self {
        JobError::Invalid(rejection.body_text())
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/jobcards", get(list_jobcards_handler))
        .route("/api/jobs/start", post(start_job_handler))
        .route("/api/jobs/stop", post(stop_job_handler))
        .route("/api/jobs/completed", get(completed_jobs_handler))
        .route("/api/jobs/active", get(active_job_handler))
        .route("/api/jobs/stats", get(job_stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_api(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind API server");
        e
    })?;

    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn index_handler() -> &'static str {
    "jobtrack is running"
}

async fn list_jobcards_handler(State(state): State<ApiState>) -> Response {
    let listing = state.service.list_job_templates().await;
    let mut response = Json(listing.templates).into_response();
    if listing.unavailable {
        response
            .headers_mut()
            .insert(CATALOG_UNAVAILABLE_HEADER, HeaderValue::from_static("true"));
    }
    response
}

async fn start_job_handler(
    State(state): State<ApiState>,
    payload: Result<Json<StartJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, JobError> {
    let Json(req) = payload?;
    let job = state.service.start_job(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(JobResponse {
            message: "Job started",
            job,
        }),
    ))
}

async fn stop_job_handler(
    State(state): State<ApiState>,
    payload: Result<Json<StopJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, JobError> {
    let Json(req) = payload?;
    let job = state.service.stop_job(req).await?;
    Ok(Json(JobResponse {
        message: "Job stopped",
        job,
    }))
}

async fn completed_jobs_handler(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, JobError> {
    Ok(Json(state.service.get_completed_jobs().await?))
}

async fn active_job_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, JobError> {
    Ok(Json(state.service.get_active_job().await?))
}

async fn job_stats_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, JobError> {
    Ok(Json(state.service.job_stats().await?))
}
