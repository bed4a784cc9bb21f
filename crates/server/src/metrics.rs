//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the reelgate server:
//! - HTTP request metrics (latency, counts, errors)
//! - Scheduler and queue status (collected dynamically)
//! - Video library status (collected dynamically)
//!
//! Pipeline, token, and gate counters live in the core crate and are
//! registered here alongside the server's own.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use reelgate_core::{JobFilter, VideoFilter, VideoStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelgate_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelgate_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelgate_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures on management routes.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelgate_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Scheduler running state (1 = running, 0 = stopped).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelgate_scheduler_running",
        "Whether the job scheduler is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs currently held by a worker.
pub static JOBS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelgate_jobs_active",
        "Number of jobs currently held by a worker",
    )
    .unwrap()
});

/// Jobs waiting for a free worker.
pub static JOBS_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelgate_jobs_queued",
        "Number of jobs waiting for a free worker",
    )
    .unwrap()
});

/// Jobs by current state (collected dynamically).
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("reelgate_jobs_by_state", "Current job count by state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Library Metrics (collected dynamically)
// =============================================================================

/// Videos by processing status (collected dynamically).
pub static VIDEOS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "reelgate_videos_by_status",
            "Current video count by processing status",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Scheduler
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(JOBS_ACTIVE.clone())).unwrap();
    registry.register(Box::new(JOBS_QUEUED.clone())).unwrap();
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();

    // Library
    registry
        .register(Box::new(VIDEOS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (pipeline, tokens, gate, oracle)
    for metric in reelgate_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current
/// values from the scheduler and the media store.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    // Update scheduler metrics
    let status = state.scheduler().status().await;
    SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    JOBS_ACTIVE.set(status.active_jobs as i64);
    JOBS_QUEUED.set(status.queued_count as i64);

    // Update job counts by state
    for state_type in [
        "queued",
        "probing",
        "transcoding",
        "packaging",
        "thumbnailing",
        "completed",
        "failed",
    ] {
        let filter = JobFilter::new().with_state(state_type).with_limit(i64::MAX);
        if let Ok(jobs) = state.store().list_jobs(&filter) {
            JOBS_BY_STATE
                .with_label_values(&[state_type])
                .set(jobs.len() as i64);
        }
    }

    // Update video counts by status
    for video_status in [
        VideoStatus::Pending,
        VideoStatus::Processing,
        VideoStatus::Ready,
        VideoStatus::Failed,
    ] {
        let filter = VideoFilter::new()
            .with_status(video_status)
            .with_limit(i64::MAX);
        if let Ok(videos) = state.store().list_videos(&filter) {
            VIDEOS_BY_STATUS
                .with_label_values(&[video_status.as_str()])
                .set(videos.len() as i64);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    // Replace UUIDs, artifact names, and numeric IDs with placeholders
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let segment_regex = regex_lite::Regex::new(r"segment_\d+\.ts").unwrap();
    let thumb_regex = regex_lite::Regex::new(r"thumb_\d+\.jpg").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = segment_regex.replace_all(&result, "segment_{n}.ts");
    let result = thumb_regex.replace_all(&result, "thumb_{n}.jpg");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/videos/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/videos/{id}");
    }

    #[test]
    fn test_normalize_path_segment() {
        let path = "/stream/550e8400-e29b-41d4-a716-446655440000/720p/segment_042.ts";
        assert_eq!(normalize_path(path), "/stream/{id}/720p/segment_{n}.ts");
    }

    #[test]
    fn test_normalize_path_thumbnail() {
        let path = "/stream/550e8400-e29b-41d4-a716-446655440000/thumbnails/thumb_25.jpg";
        assert_eq!(normalize_path(path), "/stream/{id}/thumbnails/thumb_{n}.jpg");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("reelgate_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Touch all metrics to ensure they appear in output
        // (Prometheus only outputs metrics that have been accessed)
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        SCHEDULER_RUNNING.set(0);
        JOBS_ACTIVE.set(0);
        JOBS_QUEUED.set(0);
        JOBS_BY_STATE.with_label_values(&["queued"]).set(0);
        VIDEOS_BY_STATUS.with_label_values(&["ready"]).set(0);

        let output = encode_metrics();

        // HTTP metrics
        assert!(output.contains("reelgate_http_request_duration_seconds"));
        assert!(output.contains("reelgate_http_requests_total"));
        assert!(output.contains("reelgate_http_requests_in_flight"));

        // Scheduler metrics
        assert!(output.contains("reelgate_scheduler_running"));
        assert!(output.contains("reelgate_jobs_active"));
        assert!(output.contains("reelgate_jobs_by_state"));

        // Library metrics
        assert!(output.contains("reelgate_videos_by_status"));
    }
}
