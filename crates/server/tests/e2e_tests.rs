//! End-to-end tests with mocked external dependencies.
//!
//! These tests run the full server stack in-process with mock implementations
//! for the encoder, blob storage, and the document system's permission API.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestConfig, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint_reveals_no_secrets() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);

    let raw = serde_json::to_string(&response.body).unwrap();
    assert!(
        !raw.contains("integration-test-signing-key"),
        "sanitized config leaked the signing key: {}",
        raw
    );
    assert_eq!(response.body["pipeline"]["workers"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_text() {
    let fixture = TestFixture::new().await;

    // Generate at least one request so counters exist
    let _ = fixture.get("/api/v1/health").await;

    let response = fixture.get_raw("/api/v1/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.content_type.starts_with("text/plain"));

    let body = response.body_str();
    assert!(body.contains("reelgate_http_requests_total"));
    assert!(body.contains("reelgate_scheduler_running"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/nonexistent").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Video Registration
// =============================================================================

#[tokio::test]
async fn test_create_video_queues_job() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/videos",
            json!({
                "title": "Workshop Recording",
                "original_filename": "workshop.mov"
            }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["title"], "Workshop Recording");
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["visibility"], "private");
    assert_eq!(response.body["active_job"]["state"]["type"], "queued");
    assert_eq!(response.body["active_job"]["attempt"], 1);
    assert!(response.body["id"].as_str().is_some());
}

#[tokio::test]
async fn test_create_video_with_page_binding() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/videos",
            json!({
                "title": "Page Video",
                "original_filename": "clip.mov",
                "visibility": "page_protected",
                "page_id": 42
            }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["visibility"], "page_protected");
    assert_eq!(response.body["page_id"], 42);
}

#[tokio::test]
async fn test_create_video_empty_title_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "  ", "original_filename": "clip.mov" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_video_rejects_path_in_filename() {
    let fixture = TestFixture::new().await;

    for filename in ["../../etc/passwd", "a/b.mov", "..", ""] {
        let response = fixture
            .post(
                "/api/v1/videos",
                json!({ "title": "Sneaky", "original_filename": filename }),
            )
            .await;
        assert_eq!(
            response.status,
            StatusCode::BAD_REQUEST,
            "filename {:?} should be rejected",
            filename
        );
    }
}

#[tokio::test]
async fn test_get_video_by_id() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Lookup", "original_filename": "lookup.mov" }),
        )
        .await;
    let id = created.body["id"].as_str().unwrap();

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["id"], id);
    assert_eq!(response.body["title"], "Lookup");
}

#[tokio::test]
async fn test_get_unknown_video_returns_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/videos/no-such-video").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_videos_with_status_filter() {
    let fixture = TestFixture::new().await;

    for title in ["First", "Second"] {
        let response = fixture
            .post(
                "/api/v1/videos",
                json!({ "title": title, "original_filename": "v.mov" }),
            )
            .await;
        assert_status!(response, StatusCode::CREATED);
    }
    let ready = fixture.seed_video(&fixtures::video_request("Third"));
    fixture.make_ready(&ready).await;

    let all = fixture.get("/api/v1/videos").await;
    assert_status!(all, StatusCode::OK);
    assert_eq!(all.body["videos"].as_array().unwrap().len(), 3);

    let pending = fixture.get("/api/v1/videos?status=pending").await;
    assert_eq!(pending.body["videos"].as_array().unwrap().len(), 2);

    let ready = fixture.get("/api/v1/videos?status=ready").await;
    assert_eq!(ready.body["videos"].as_array().unwrap().len(), 1);
    assert_eq!(ready.body["videos"][0]["title"], "Third");

    let bogus = fixture.get("/api/v1/videos?status=melting").await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_videos_pagination() {
    let fixture = TestFixture::new().await;

    for i in 0..5 {
        fixture.seed_video(&fixtures::video_request(&format!("Video {}", i)));
    }

    let page = fixture.get("/api/v1/videos?limit=2&offset=1").await;
    assert_status!(page, StatusCode::OK);
    assert_eq!(page.body["videos"].as_array().unwrap().len(), 2);
    assert_eq!(page.body["limit"], 2);
    assert_eq!(page.body["offset"], 1);
}

// =============================================================================
// Video Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_video_with_active_job_conflicts() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Busy", "original_filename": "busy.mov" }),
        )
        .await;
    let id = created.body["id"].as_str().unwrap();

    // The registration job is still queued
    let response = fixture.delete(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    // Cancelling the job unblocks deletion
    let job_id = created.body["active_job"]["id"].as_str().unwrap();
    let cancelled = fixture.delete(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_status!(cancelled, StatusCode::OK);

    let response = fixture.delete(&format!("/api/v1/videos/{}", id)).await;
    assert_status!(response, StatusCode::OK);

    let gone = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_video_removes_blobs() {
    let fixture = TestFixture::new().await;

    let video = fixture.seed_video(&fixtures::video_request("Doomed"));
    fixture.make_ready(&video).await;
    assert!(fixture.blobs.blob_count().await > 0);

    let response = fixture.delete(&format!("/api/v1/videos/{}", video.id)).await;
    assert_status!(response, StatusCode::OK);

    assert_eq!(fixture.blobs.blob_count().await, 0);
}

#[tokio::test]
async fn test_delete_unknown_video_returns_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.delete("/api/v1/videos/no-such-video").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Job Lifecycle
// =============================================================================

#[tokio::test]
async fn test_submit_job_conflicts_while_one_is_open() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Queued", "original_filename": "q.mov" }),
        )
        .await;
    let id = created.body["id"].as_str().unwrap();

    let response = fixture
        .post_empty(&format!("/api/v1/videos/{}/jobs", id))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_resubmit_after_cancel_increments_attempt() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Retry", "original_filename": "r.mov" }),
        )
        .await;
    let id = created.body["id"].as_str().unwrap();
    let job_id = created.body["active_job"]["id"].as_str().unwrap();

    let cancelled = fixture.delete(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_status!(cancelled, StatusCode::OK);
    assert_eq!(cancelled.body["state"]["type"], "failed");
    assert_eq!(cancelled.body["state"]["class"], "cancelled");

    let resubmitted = fixture
        .post_empty(&format!("/api/v1/videos/{}/jobs", id))
        .await;
    assert_status!(resubmitted, StatusCode::CREATED);
    assert_eq!(resubmitted.body["attempt"], 2);
    assert_eq!(resubmitted.body["state"]["type"], "queued");
}

#[tokio::test]
async fn test_submit_job_for_unknown_video_returns_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_empty("/api/v1/videos/ghost/jobs").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_job_and_list_jobs() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Jobs", "original_filename": "j.mov" }),
        )
        .await;
    let video_id = created.body["id"].as_str().unwrap();
    let job_id = created.body["active_job"]["id"].as_str().unwrap();

    let job = fixture.get(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_status!(job, StatusCode::OK);
    assert_eq!(job.body["video_id"], video_id);
    assert_eq!(job.body["progress"], 0);

    let listed = fixture.get("/api/v1/jobs?state=queued").await;
    assert_status!(listed, StatusCode::OK);
    assert_eq!(listed.body["jobs"].as_array().unwrap().len(), 1);

    let by_video = fixture
        .get(&format!("/api/v1/jobs?video_id={}", video_id))
        .await;
    assert_eq!(by_video.body["jobs"].as_array().unwrap().len(), 1);

    let none = fixture.get("/api/v1/jobs?state=completed").await;
    assert_eq!(none.body["jobs"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_cancel_terminal_job_conflicts() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Done", "original_filename": "d.mov" }),
        )
        .await;
    let job_id = created.body["active_job"]["id"].as_str().unwrap();

    let first = fixture.delete(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_status!(first, StatusCode::OK);

    let second = fixture.delete(&format!("/api/v1/jobs/{}", job_id)).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_unknown_job_returns_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.delete("/api/v1/jobs/no-such-job").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Management Scoping (no oracle: single-operator mode, routes open)
// =============================================================================

#[tokio::test]
async fn test_management_open_without_document_api() {
    let fixture = TestFixture::with_config(TestConfig::default()).await;

    let response = fixture
        .post(
            "/api/v1/videos",
            json!({ "title": "Open", "original_filename": "open.mov" }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["uploaded_by"], "anonymous");
}

#[tokio::test]
async fn test_uploader_recorded_from_credentials() {
    let fixture = TestFixture::with_config(TestConfig::with_oracle()).await;
    let credentials = fixtures::manager_credentials();
    fixture
        .oracle
        .register_manager(&credentials, fixtures::admin_identity())
        .await;

    let response = fixture
        .post_as(
            "/api/v1/videos",
            json!({ "title": "Attributed", "original_filename": "a.mov" }),
            &credentials,
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["uploaded_by"], "admin@example.com");
}
