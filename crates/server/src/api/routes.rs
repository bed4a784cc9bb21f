use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, jobs, middleware, stream, tokens, videos};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Management routes require verified manager credentials
    let management_routes = Router::new()
        // Videos
        .route("/videos", post(videos::create_video))
        .route("/videos", get(videos::list_videos))
        .route("/videos/{id}", get(videos::get_video))
        .route("/videos/{id}", delete(videos::delete_video))
        .route("/videos/{id}/jobs", post(jobs::submit_job))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}", delete(jobs::cancel_job))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::manager_auth_middleware,
        ));

    // Token issuance enforces per-visibility policy itself, so any caller
    // may ask; health, config, and metrics are open
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        .route("/videos/{id}/viewer-token", post(tokens::issue_viewer_token))
        .merge(management_routes)
        .with_state(state.clone());

    // Streaming endpoints carry their own gate; the viewer token rides in
    // the query string so stock HLS players can follow rewritten playlists
    let stream_routes = Router::new()
        .route("/stream/{video_id}/master.m3u8", get(stream::master_playlist))
        .route("/stream/{video_id}/thumbnails/{name}", get(stream::thumbnail))
        .route(
            "/stream/{video_id}/{quality}/playlist.m3u8",
            get(stream::media_playlist),
        )
        .route("/stream/{video_id}/{quality}/{segment}", get(stream::segment))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(stream_routes)
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(axum_middleware::from_fn(middleware::caller_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
