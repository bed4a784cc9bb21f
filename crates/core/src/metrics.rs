//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scheduler (submissions, completions, failures, job durations)
//! - Pipeline (per-preset encodes, stage durations)
//! - Streaming authorization (tokens issued, gate decisions)
//! - External services (permission oracle)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scheduler - Job Metrics
// =============================================================================

/// Jobs submitted total.
pub static JOB_SUBMISSIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelgate_job_submissions_total",
        "Total transcode jobs submitted",
    )
    .unwrap()
});

/// Jobs completed total.
pub static JOB_COMPLETIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelgate_job_completions_total",
        "Total transcode jobs completed successfully",
    )
    .unwrap()
});

/// Jobs failed total by failure class.
pub static JOB_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelgate_job_failures_total", "Total transcode jobs failed"),
        &["class"], // "input", "encoder", "storage", "cancelled", "internal"
    )
    .unwrap()
});

/// Job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelgate_job_duration_seconds",
            "Wall-clock duration of transcode jobs",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
        ]),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Preset encodes total by quality and result.
pub static PRESETS_ENCODED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelgate_presets_encoded_total",
            "Total per-preset encode outcomes",
        ),
        &["quality", "result"], // result: "success", "failed", "skipped"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelgate_stage_duration_seconds",
            "Duration of pipeline stages",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
        ]),
        &["stage"], // "probe", "transcode", "package", "thumbnail"
    )
    .unwrap()
});

// =============================================================================
// Streaming Authorization Metrics
// =============================================================================

/// Viewer tokens issued total by video visibility.
pub static TOKENS_ISSUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelgate_viewer_tokens_issued_total",
            "Total viewer tokens issued",
        ),
        &["visibility"], // "public", "unlisted", "page_protected", "private"
    )
    .unwrap()
});

/// Streaming gate decisions total by outcome.
pub static GATE_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelgate_gate_decisions_total",
            "Total streaming gate decisions",
        ),
        &["outcome"], // "allowed", "forbidden", "not_found", "not_ready", "unavailable"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Permission oracle requests total.
pub static ORACLE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelgate_oracle_requests_total",
            "Total permission oracle requests",
        ),
        &["operation", "status"], // operation: "page_access", "verify_manager"; status: "success", "error"
    )
    .unwrap()
});

/// Permission oracle request duration.
pub static ORACLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelgate_oracle_duration_seconds",
            "Duration of permission oracle calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(JOB_SUBMISSIONS.clone()),
        Box::new(JOB_COMPLETIONS.clone()),
        Box::new(JOB_FAILURES.clone()),
        Box::new(JOB_DURATION.clone()),
        // Pipeline
        Box::new(PRESETS_ENCODED.clone()),
        Box::new(STAGE_DURATION.clone()),
        // Streaming authorization
        Box::new(TOKENS_ISSUED.clone()),
        Box::new(GATE_DECISIONS.clone()),
        // External services
        Box::new(ORACLE_REQUESTS.clone()),
        Box::new(ORACLE_DURATION.clone()),
    ]
}
