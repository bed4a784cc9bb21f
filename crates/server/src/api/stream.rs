//! Gated delivery of playlists, segments, and thumbnails.
//!
//! Every fetch passes through the streaming gate, then reads the artifact
//! from blob storage. Playlists are rewritten per request so the presented
//! viewer token rides along on every URI a player will fetch next.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use reelgate_core::metrics::GATE_DECISIONS;
use reelgate_core::pipeline::manifest;
use reelgate_core::storage::paths;
use reelgate_core::{Caller, GateError, StorageError, Video};

use super::middleware::AuthCaller;
use crate::state::AppState;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";
const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

// Artifact names under a video's prefix are machine-generated; anything
// else in the URL is rejected before it can reach storage
static SEGMENT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^segment_\d{3}\.ts$").unwrap());
static THUMBNAIL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^thumb_\d{1,3}\.jpg$").unwrap());
static QUALITY_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,4}p$").unwrap());

/// Query parameters common to all stream requests
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Viewer token, as injected into playlist URIs
    pub token: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Runs the gate for a stream request, recording the decision.
///
/// A missing video and a denied hidden video produce the same response.
async fn gate_video(
    state: &AppState,
    video_id: &str,
    token: Option<&str>,
    caller: &Caller,
) -> Result<Video, Response> {
    let video = match state.store().get_video(video_id) {
        Ok(Some(video)) => video,
        Ok(None) => {
            GATE_DECISIONS.with_label_values(&["not_found"]).inc();
            return Err(error_response(StatusCode::NOT_FOUND, "not found"));
        }
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    match state.gate().authorize(&video, token, caller).await {
        Ok(()) => {
            GATE_DECISIONS.with_label_values(&["allowed"]).inc();
            Ok(video)
        }
        Err(GateError::NotFound) => {
            GATE_DECISIONS.with_label_values(&["not_found"]).inc();
            Err(error_response(StatusCode::NOT_FOUND, "not found"))
        }
        Err(GateError::Forbidden) => {
            GATE_DECISIONS.with_label_values(&["forbidden"]).inc();
            Err(error_response(StatusCode::FORBIDDEN, "access denied"))
        }
        Err(e @ GateError::NotReady { .. }) => {
            GATE_DECISIONS.with_label_values(&["not_ready"]).inc();
            Err(error_response(StatusCode::CONFLICT, e.to_string()))
        }
        Err(GateError::ServiceUnavailable(reason)) => {
            GATE_DECISIONS.with_label_values(&["unavailable"]).inc();
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, reason))
        }
    }
}

async fn fetch_blob(state: &AppState, path: &str) -> Result<Vec<u8>, Response> {
    match state.blobs().get(path).await {
        Ok(bytes) => Ok(bytes),
        Err(StorageError::NotFound { .. }) => {
            Err(error_response(StatusCode::NOT_FOUND, "not found"))
        }
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

fn media_response(bytes: Vec<u8>, content_type: &'static str) -> Response {
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

fn playlist_response(bytes: Vec<u8>, token: Option<&str>) -> Response {
    let playlist = String::from_utf8_lossy(&bytes);
    let body = match token {
        Some(token) => manifest::inject_token(&playlist, token),
        None => playlist.into_owned(),
    };
    media_response(body.into_bytes(), PLAYLIST_CONTENT_TYPE)
}

// ============================================================================
// Handlers
// ============================================================================

/// Serve the master playlist with media-playlist URIs carrying the token
pub async fn master_playlist(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Query(params): Query<StreamParams>,
    AuthCaller(caller): AuthCaller,
) -> Response {
    let token = params.token.as_deref();
    let video = match gate_video(&state, &video_id, token, &caller).await {
        Ok(video) => video,
        Err(response) => return response,
    };

    match fetch_blob(&state, &paths::master_playlist(&video.id)).await {
        Ok(bytes) => playlist_response(bytes, token),
        Err(response) => response,
    }
}

/// Serve a quality's media playlist with segment URIs carrying the token
pub async fn media_playlist(
    State(state): State<Arc<AppState>>,
    Path((video_id, quality)): Path<(String, String)>,
    Query(params): Query<StreamParams>,
    AuthCaller(caller): AuthCaller,
) -> Response {
    let token = params.token.as_deref();
    let video = match gate_video(&state, &video_id, token, &caller).await {
        Ok(video) => video,
        Err(response) => return response,
    };

    if !QUALITY_NAME.is_match(&quality) {
        return error_response(StatusCode::NOT_FOUND, "not found");
    }

    match fetch_blob(&state, &paths::playlist(&video.id, &quality)).await {
        Ok(bytes) => playlist_response(bytes, token),
        Err(response) => response,
    }
}

/// Serve one transport-stream segment
pub async fn segment(
    State(state): State<Arc<AppState>>,
    Path((video_id, quality, segment)): Path<(String, String, String)>,
    Query(params): Query<StreamParams>,
    AuthCaller(caller): AuthCaller,
) -> Response {
    let token = params.token.as_deref();
    let video = match gate_video(&state, &video_id, token, &caller).await {
        Ok(video) => video,
        Err(response) => return response,
    };

    if !QUALITY_NAME.is_match(&quality) || !SEGMENT_NAME.is_match(&segment) {
        return error_response(StatusCode::NOT_FOUND, "not found");
    }

    let path = format!("{}{}", paths::quality_prefix(&video.id, &quality), segment);
    match fetch_blob(&state, &path).await {
        Ok(bytes) => media_response(bytes, SEGMENT_CONTENT_TYPE),
        Err(response) => response,
    }
}

/// Serve a still-frame thumbnail
pub async fn thumbnail(
    State(state): State<Arc<AppState>>,
    Path((video_id, name)): Path<(String, String)>,
    Query(params): Query<StreamParams>,
    AuthCaller(caller): AuthCaller,
) -> Response {
    let token = params.token.as_deref();
    let video = match gate_video(&state, &video_id, token, &caller).await {
        Ok(video) => video,
        Err(response) => return response,
    };

    if !THUMBNAIL_NAME.is_match(&name) {
        return error_response(StatusCode::NOT_FOUND, "not found");
    }

    let path = format!("{}{}", paths::thumbnails_prefix(&video.id), name);
    match fetch_blob(&state, &path).await {
        Ok(bytes) => media_response(bytes, THUMBNAIL_CONTENT_TYPE),
        Err(response) => response,
    }
}
