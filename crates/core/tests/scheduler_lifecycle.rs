//! Scheduler lifecycle integration tests.
//!
//! These run a live scheduler (dispatch loop + worker pool) against a real
//! SQLite store, mock encoder, and in-memory blobs, and verify the full
//! queued -> probing -> transcoding -> packaging -> completed flow plus
//! cancellation and orphan recovery across restarts.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reelgate_core::{
    config::{EncoderSettings, PipelineSettings},
    storage::{paths, BlobStore},
    testing::{fixtures, MemoryBlobStore, MockEncoder},
    Encoder, FailureClass, Job, JobFilter, JobRunner, JobScheduler, JobState, MediaStore,
    SqliteMediaStore, Video, VideoStatus,
};

/// Test helper holding the shared stores and mocks.
///
/// `create_scheduler` builds a fresh scheduler (with its own claim table)
/// over the shared store, so calling it twice simulates a process restart.
struct TestHarness {
    store: Arc<dyn MediaStore>,
    blobs: Arc<MemoryBlobStore>,
    encoder: Arc<MockEncoder>,
    settings: PipelineSettings,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let settings = PipelineSettings {
            workers: 2,
            max_attempts: 3,
            preset_retries: 0,
            poll_interval_secs: 1,
            presets: vec!["720p".to_string(), "480p".to_string()],
            work_dir: std::env::temp_dir().join("reelgate-lifecycle-tests"),
        };
        Self::with_settings(settings).await
    }

    async fn with_settings(settings: PipelineSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let store: Arc<dyn MediaStore> =
            Arc::new(SqliteMediaStore::new(&db_path).expect("Failed to create media store"));
        let blobs = Arc::new(MemoryBlobStore::new());
        let encoder = Arc::new(MockEncoder::new());

        Self {
            store,
            blobs,
            encoder,
            settings,
            _temp_dir: temp_dir,
        }
    }

    fn create_scheduler(&self) -> JobScheduler {
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.blobs) as Arc<dyn BlobStore>,
            Arc::clone(&self.encoder) as Arc<dyn Encoder>,
            EncoderSettings::default(),
            self.settings.clone(),
        ));
        JobScheduler::new(self.settings.clone(), Arc::clone(&self.store), runner)
    }

    /// Register a video and seed its original upload into blob storage.
    async fn seed_video(&self, title: &str) -> Video {
        let video = self
            .store
            .create_video(fixtures::video_request(title))
            .expect("Failed to create video");
        self.blobs
            .put(
                &paths::original(&video.id, &video.original_filename),
                b"original-bytes",
            )
            .await
            .expect("Failed to seed original");
        video
    }

    fn job(&self, job_id: &str) -> Job {
        self.store
            .get_job(job_id)
            .expect("Failed to read job")
            .expect("Job not found")
    }

    fn video(&self, video_id: &str) -> Video {
        self.store
            .get_video(video_id)
            .expect("Failed to read video")
            .expect("Video not found")
    }

    async fn wait_for_state(&self, job_id: &str, expected: &str, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(50);

        while start.elapsed() < timeout {
            let job = self.job(job_id);
            let state_type = job.state.state_type();
            if state_type == expected {
                return true;
            }
            // Stop early once the job settles somewhere else
            if job.state.is_terminal() {
                return false;
            }
            tokio::time::sleep(poll_interval).await;
        }
        false
    }

    /// Wait until a worker has claimed the job (left the queued state).
    async fn wait_until_claimed(&self, job_id: &str, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(50);

        while start.elapsed() < timeout {
            let job = self.job(job_id);
            if job.state.is_terminal() {
                return false;
            }
            if job.state.state_type() != "queued" {
                return true;
            }
            tokio::time::sleep(poll_interval).await;
        }
        false
    }
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_submitted_job_runs_to_completion() {
    let harness = TestHarness::new().await;
    let video = harness.seed_video("Launch Recording").await;

    let scheduler = harness.create_scheduler();
    let job = scheduler.submit(&video.id).expect("Failed to submit job");
    assert_eq!(job.state.state_type(), "queued");
    assert_eq!(job.attempt, 1);

    scheduler.start().await;

    let completed = harness
        .wait_for_state(&job.id, "completed", Duration::from_secs(10))
        .await;
    scheduler.stop().await;
    assert!(
        completed,
        "Job should complete, got {:?}",
        harness.job(&job.id).state
    );

    let job = harness.job(&job.id);
    assert_eq!(job.progress, 100);
    match job.state {
        JobState::Completed {
            variants_created, ..
        } => assert_eq!(variants_created, 2),
        other => panic!("Expected completed state, got {:?}", other),
    }

    let video = harness.video(&video.id);
    assert_eq!(video.status, VideoStatus::Ready);
    assert_eq!(video.duration_secs, Some(120.0));

    let mut qualities: Vec<String> = harness
        .store
        .variants_for_video(&video.id)
        .expect("Failed to list variants")
        .into_iter()
        .map(|v| v.quality)
        .collect();
    qualities.sort();
    assert_eq!(qualities, vec!["480p", "720p"]);

    // Streaming artifacts are durable; the intermediate rendition is not
    assert!(harness.blobs.contains(&paths::master_playlist(&video.id)).await);
    assert!(harness.blobs.contains(&paths::playlist(&video.id, "720p")).await);
    assert!(harness.blobs.contains(&paths::segment(&video.id, "720p", 0)).await);
    assert!(!harness.blobs.contains(&paths::rendition(&video.id, "720p")).await);
}

#[tokio::test]
async fn test_two_videos_transcode_concurrently() {
    let harness = TestHarness::new().await;
    let first = harness.seed_video("First Clip").await;
    let second = harness.seed_video("Second Clip").await;

    let scheduler = harness.create_scheduler();
    let job1 = scheduler.submit(&first.id).expect("Failed to submit job");
    let job2 = scheduler.submit(&second.id).expect("Failed to submit job");

    scheduler.start().await;

    let first_done = harness
        .wait_for_state(&job1.id, "completed", Duration::from_secs(15))
        .await;
    let second_done = harness
        .wait_for_state(&job2.id, "completed", Duration::from_secs(15))
        .await;
    scheduler.stop().await;

    assert!(first_done, "First job should complete");
    assert!(second_done, "Second job should complete");
    assert_eq!(harness.video(&first.id).status, VideoStatus::Ready);
    assert_eq!(harness.video(&second.id).status, VideoStatus::Ready);

    // Two presets per video
    assert_eq!(harness.encoder.encode_count().await, 4);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[tokio::test]
async fn test_cancel_running_job_signals_the_worker() {
    let harness = TestHarness::new().await;
    harness
        .encoder
        .set_encode_delay(Duration::from_secs(3))
        .await;
    let video = harness.seed_video("Long Encode").await;

    let scheduler = harness.create_scheduler();
    let job = scheduler.submit(&video.id).expect("Failed to submit job");
    scheduler.start().await;

    assert!(
        harness
            .wait_until_claimed(&job.id, Duration::from_secs(10))
            .await,
        "Job should be claimed by a worker"
    );

    // A live job is signalled, not closed summarily
    let in_flight = scheduler.cancel(&job.id).await.expect("Cancel failed");
    assert!(!in_flight.state.is_terminal());

    let failed = harness
        .wait_for_state(&job.id, "failed", Duration::from_secs(15))
        .await;
    scheduler.stop().await;
    assert!(
        failed,
        "Cancelled job should settle as failed, got {:?}",
        harness.job(&job.id).state
    );

    let job = harness.job(&job.id);
    assert_eq!(job.state.failure_class(), Some(FailureClass::Cancelled));

    let video = harness.video(&video.id);
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(harness
        .store
        .variants_for_video(&video.id)
        .expect("Failed to list variants")
        .is_empty());
}

// =============================================================================
// Restart Recovery Tests
// =============================================================================

#[tokio::test]
async fn test_restart_requeues_job_lost_in_flight() {
    let harness = TestHarness::new().await;
    // Long enough that the worker never finishes within the test
    harness
        .encoder
        .set_encode_delay(Duration::from_secs(60))
        .await;
    let video = harness.seed_video("Interrupted Encode").await;

    let first = harness.create_scheduler();
    let job = first.submit(&video.id).expect("Failed to submit job");
    first.start().await;
    assert!(
        harness
            .wait_until_claimed(&job.id, Duration::from_secs(10))
            .await,
        "Job should be claimed by a worker"
    );
    // The worker keeps its processing state past the stop
    first.stop().await;

    // A fresh scheduler has no claim for the job and recovers it on start
    let second = harness.create_scheduler();
    second.start().await;

    let orphaned = harness.job(&job.id);
    match &orphaned.state {
        JobState::Failed {
            error, retryable, ..
        } => {
            assert!(error.contains("worker lost"), "unexpected error: {}", error);
            assert!(retryable);
        }
        other => panic!("Expected failed state, got {:?}", other),
    }

    let jobs = harness
        .store
        .list_jobs(&JobFilter::new().with_video_id(&video.id))
        .expect("Failed to list jobs");
    let requeued = jobs
        .iter()
        .find(|j| j.attempt == 2)
        .expect("Lost job should be requeued as a new attempt");
    assert!(!requeued.state.is_terminal());

    second.stop().await;
}

#[tokio::test]
async fn test_restart_retires_job_out_of_attempts() {
    let settings = PipelineSettings {
        workers: 2,
        max_attempts: 1,
        preset_retries: 0,
        poll_interval_secs: 1,
        presets: vec!["720p".to_string(), "480p".to_string()],
        work_dir: std::env::temp_dir().join("reelgate-lifecycle-tests"),
    };
    let harness = TestHarness::with_settings(settings).await;
    harness
        .encoder
        .set_encode_delay(Duration::from_secs(60))
        .await;
    let video = harness.seed_video("Doomed Encode").await;

    let first = harness.create_scheduler();
    let job = first.submit(&video.id).expect("Failed to submit job");
    first.start().await;
    assert!(
        harness
            .wait_until_claimed(&job.id, Duration::from_secs(10))
            .await,
        "Job should be claimed by a worker"
    );
    first.stop().await;

    let second = harness.create_scheduler();
    second.start().await;

    let retired = harness.job(&job.id);
    match &retired.state {
        JobState::Failed {
            error, retryable, ..
        } => {
            assert!(error.contains("worker lost"), "unexpected error: {}", error);
            assert!(!retryable);
        }
        other => panic!("Expected failed state, got {:?}", other),
    }

    // No fresh attempt, and the video settles as failed
    let jobs = harness
        .store
        .list_jobs(&JobFilter::new().with_video_id(&video.id))
        .expect("Failed to list jobs");
    assert_eq!(jobs.len(), 1);
    assert_eq!(harness.video(&video.id).status, VideoStatus::Failed);

    second.stop().await;
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_status_reflects_scheduler_state() {
    let harness = TestHarness::new().await;
    let video = harness.seed_video("Queued Clip").await;

    let scheduler = harness.create_scheduler();
    assert!(
        !scheduler.status().await.running,
        "Scheduler should not be running before start"
    );

    scheduler.submit(&video.id).expect("Failed to submit job");
    let status = scheduler.status().await;
    assert_eq!(status.queued_count, 1);
    assert_eq!(status.workers, 2);

    scheduler.start().await;
    assert!(
        scheduler.status().await.running,
        "Scheduler should be running after start"
    );

    scheduler.stop().await;
    assert!(
        !scheduler.status().await.running,
        "Scheduler should not be running after stop"
    );
}

#[tokio::test]
async fn test_stop_completes_promptly_with_work_in_flight() {
    let harness = TestHarness::new().await;
    harness
        .encoder
        .set_encode_delay(Duration::from_secs(5))
        .await;
    let video = harness.seed_video("Slow Encode").await;

    let scheduler = harness.create_scheduler();
    let job = scheduler.submit(&video.id).expect("Failed to submit job");
    scheduler.start().await;

    assert!(
        harness
            .wait_until_claimed(&job.id, Duration::from_secs(10))
            .await,
        "Job should be claimed by a worker"
    );

    // Stop must not wait for the in-flight encode
    let stop_result = tokio::time::timeout(Duration::from_secs(5), scheduler.stop()).await;
    assert!(
        stop_result.is_ok(),
        "Scheduler stop should complete within timeout"
    );
}
