//! Video management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use reelgate_core::storage::paths;
use reelgate_core::{
    CreateVideoRequest, StoreError, Variant, Video, VideoFilter, VideoStatus, Visibility,
};

use super::jobs::JobResponse;
use super::middleware::AuthUser;
use crate::state::AppState;

/// Maximum allowed limit for video queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for video queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for registering a video
#[derive(Debug, Deserialize)]
pub struct CreateVideoBody {
    /// Display title
    pub title: String,
    /// Filename of the uploaded original, expected at its storage path
    pub original_filename: String,
    /// Access policy. Omitted means private, the fail-safe policy.
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    /// Linked document page, if any
    pub page_id: Option<i64>,
}

fn default_visibility() -> Visibility {
    Visibility::Private
}

/// Query parameters for listing videos
#[derive(Debug, Deserialize)]
pub struct ListVideosParams {
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of videos to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for video operations
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub original_filename: String,
    pub duration_secs: Option<f64>,
    pub status: VideoStatus,
    pub visibility: Visibility,
    pub page_id: Option<i64>,
    pub uploaded_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub variants: Vec<VariantResponse>,
    pub active_job: Option<JobResponse>,
}

/// One produced rendition of a video
#[derive(Debug, Serialize)]
pub struct VariantResponse {
    pub id: String,
    pub quality: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub size_bytes: u64,
    pub created_at: String,
}

impl From<Variant> for VariantResponse {
    fn from(variant: Variant) -> Self {
        Self {
            id: variant.id,
            quality: variant.quality,
            width: variant.width,
            height: variant.height,
            bitrate_kbps: variant.bitrate_kbps,
            size_bytes: variant.size_bytes,
            created_at: variant.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing videos
#[derive(Debug, Serialize)]
pub struct ListVideosResponse {
    pub videos: Vec<VideoResponse>,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn store_error_response(e: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        StoreError::VideoNotFound(_) | StoreError::JobNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict { .. } | StoreError::InvalidState { .. } => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

/// Assembles the full response for a video: row, variants, active job.
fn video_response(state: &AppState, video: Video) -> Result<VideoResponse, StoreError> {
    let variants = state.store().variants_for_video(&video.id)?;
    let active_job = state.store().active_job_for_video(&video.id)?;

    Ok(VideoResponse {
        id: video.id,
        title: video.title,
        original_filename: video.original_filename,
        duration_secs: video.duration_secs,
        status: video.status,
        visibility: video.visibility,
        page_id: video.page_id,
        uploaded_by: video.uploaded_by,
        created_at: video.created_at.to_rfc3339(),
        updated_at: video.updated_at.to_rfc3339(),
        variants: variants.into_iter().map(VariantResponse::from).collect(),
        active_job: active_job.map(JobResponse::from),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a video and queue its first transcode job
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    AuthUser(uploaded_by): AuthUser,
    Json(body): Json<CreateVideoBody>,
) -> Result<(StatusCode, Json<VideoResponse>), impl IntoResponse> {
    if body.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "title must not be empty".to_string(),
            }),
        ));
    }

    // The filename becomes part of the blob path, so it must stay a single
    // path component
    let filename = body.original_filename.trim();
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "original_filename must be a plain file name".to_string(),
            }),
        ));
    }

    let request = CreateVideoRequest {
        title: body.title.trim().to_string(),
        original_filename: filename.to_string(),
        uploaded_by,
        visibility: body.visibility,
        page_id: body.page_id,
    };

    let video = match state.store().create_video(request) {
        Ok(video) => video,
        Err(e) => return Err(store_error_response(e)),
    };

    if let Err(e) = state.scheduler().submit(&video.id) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("video registered but job could not be queued: {}", e),
            }),
        ));
    }

    info!(
        "Video registered: id={}, title={:?}, visibility={}",
        video.id,
        video.title,
        video.visibility.as_str()
    );

    match video_response(&state, video) {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(e) => Err(store_error_response(e)),
    }
}

/// Get a video by ID
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, impl IntoResponse> {
    match state.store().get_video(&id) {
        Ok(Some(video)) => match video_response(&state, video) {
            Ok(response) => Ok(Json(response)),
            Err(e) => Err(store_error_response(e)),
        },
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Video not found: {}", id),
            }),
        )),
        Err(e) => Err(store_error_response(e)),
    }
}

/// List videos with optional filters
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListVideosParams>,
) -> Result<Json<ListVideosResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = VideoFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        match VideoStatus::parse(status) {
            Some(status) => filter = filter.with_status(status),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("unknown status: {}", status),
                    }),
                ));
            }
        }
    }

    let videos = match state.store().list_videos(&filter) {
        Ok(videos) => videos,
        Err(e) => return Err(store_error_response(e)),
    };

    let mut responses = Vec::with_capacity(videos.len());
    for video in videos {
        match video_response(&state, video) {
            Ok(response) => responses.push(response),
            Err(e) => return Err(store_error_response(e)),
        }
    }

    Ok(Json(ListVideosResponse {
        videos: responses,
        limit,
        offset,
    }))
}

/// Delete a video together with its jobs, variants, and stored artifacts
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, impl IntoResponse> {
    // A running worker owns the video's artifacts; cancel first
    match state.store().active_job_for_video(&id) {
        Ok(Some(job)) => {
            return Err((
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("video has an active job: {} (cancel it first)", job.id),
                }),
            ));
        }
        Ok(None) => {}
        Err(e) => return Err(store_error_response(e)),
    }

    let video = match state.store().delete_video(&id) {
        Ok(video) => video,
        Err(e) => return Err(store_error_response(e)),
    };

    // Rows are gone; leftover blobs are garbage, not corruption
    match state.blobs().delete_prefix(&paths::video_prefix(&id)).await {
        Ok(removed) => info!("Video deleted: id={}, blobs_removed={}", id, removed),
        Err(e) => warn!("Video {} deleted but blob cleanup failed: {}", id, e),
    }

    Ok(Json(VideoResponse {
        id: video.id,
        title: video.title,
        original_filename: video.original_filename,
        duration_secs: video.duration_secs,
        status: video.status,
        visibility: video.visibility,
        page_id: video.page_id,
        uploaded_by: video.uploaded_by,
        created_at: video.created_at.to_rfc3339(),
        updated_at: video.updated_at.to_rfc3339(),
        variants: Vec::new(),
        active_job: None,
    }))
}
