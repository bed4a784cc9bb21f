//! Viewer token issuance handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use reelgate_core::metrics::TOKENS_ISSUED;
use reelgate_core::AuthError;

use super::middleware::AuthCaller;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for token issuance
#[derive(Debug, Default, Deserialize)]
pub struct ViewerTokenBody {
    /// Page context the viewer is watching from
    pub page_id: Option<i64>,
}

/// Response carrying a freshly minted viewer token
#[derive(Debug, Serialize)]
pub struct ViewerTokenResponse {
    pub token: String,
    pub expires_at: i64,
    pub video_id: String,
    /// Master playlist URL with the token already attached
    pub stream_url: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn auth_error_response(e: AuthError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        AuthError::NotAuthenticated | AuthError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a viewer token for a video, enforcing its visibility policy
pub async fn issue_viewer_token(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    AuthCaller(caller): AuthCaller,
    body: Option<Json<ViewerTokenBody>>,
) -> Result<(StatusCode, Json<ViewerTokenResponse>), impl IntoResponse> {
    let page_id = body.and_then(|b| b.page_id);

    let video = match state.store().get_video(&video_id) {
        Ok(Some(video)) => video,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Video not found: {}", video_id),
                }),
            ));
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
    };

    match state.issuer().issue(&video, page_id, &caller).await {
        Ok(issued) => {
            TOKENS_ISSUED
                .with_label_values(&[video.visibility.as_str()])
                .inc();
            info!(
                "Viewer token issued: video_id={}, visibility={}, page_id={:?}",
                video.id,
                video.visibility.as_str(),
                page_id
            );

            let stream_url = format!(
                "/stream/{}/master.m3u8?token={}",
                issued.video_id,
                urlencoding::encode(&issued.token)
            );

            Ok((
                StatusCode::CREATED,
                Json(ViewerTokenResponse {
                    token: issued.token,
                    expires_at: issued.expires_at,
                    video_id: issued.video_id,
                    stream_url,
                }),
            ))
        }
        Err(e) => Err(auth_error_response(e)),
    }
}
