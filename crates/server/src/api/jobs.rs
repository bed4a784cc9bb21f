//! Transcode job handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use reelgate_core::{Job, JobFilter, JobState, SchedulerError, StoreError};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by state type
    pub state: Option<String>,
    /// Filter by video
    pub video_id: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for job operations
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub video_id: String,
    pub attempt: u32,
    pub progress: u8,
    pub state: JobState,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            video_id: job.video_id,
            attempt: job.attempt,
            progress: job.progress,
            state: job.state,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn scheduler_error_response(e: SchedulerError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        SchedulerError::VideoNotFound(_) | SchedulerError::JobNotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::Conflict { .. } | SchedulerError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        SchedulerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn store_error_response(e: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        StoreError::VideoNotFound(_) | StoreError::JobNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict { .. } | StoreError::InvalidState { .. } => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

/// Queue a transcode job for a video
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<(StatusCode, Json<JobResponse>), impl IntoResponse> {
    match state.scheduler().submit(&video_id) {
        Ok(job) => Ok((StatusCode::CREATED, Json(JobResponse::from(job)))),
        Err(e) => Err(scheduler_error_response(e)),
    }
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.store().get_job(&id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Job not found: {}", id),
            }),
        )),
        Err(e) => Err(store_error_response(e)),
    }
}

/// List jobs with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref state_filter) = params.state {
        filter = filter.with_state(state_filter);
    }

    if let Some(ref video_id) = params.video_id {
        filter = filter.with_video_id(video_id);
    }

    match state.store().list_jobs(&filter) {
        Ok(jobs) => Ok(Json(ListJobsResponse {
            jobs: jobs.into_iter().map(JobResponse::from).collect(),
            limit,
            offset,
        })),
        Err(e) => Err(store_error_response(e)),
    }
}

/// Cancel a job (DELETE endpoint)
///
/// A queued job closes immediately; a processing job is signaled and aborts
/// at its next check point.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    match state.scheduler().cancel(&id).await {
        Ok(job) => Ok(Json(JobResponse::from(job))),
        Err(e) => Err(scheduler_error_response(e)),
    }
}
