//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling comprehensive E2E testing
//! without ffmpeg, real storage, or the document system.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reelgate_core::testing::{FixedClock, MemoryBlobStore, MockEncoder, MockOracle};
use reelgate_core::{
    load_config_from_str, storage::paths, BlobStore, Encoder, JobRunner, JobScheduler,
    ManagementCredentials, MediaStore, PermissionOracle, SqliteMediaStore, StreamingGate,
    TokenIssuer, TokenSigner, Video, VideoStatus,
};

/// Re-export fixtures for test convenience
pub use reelgate_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Encoding (MockEncoder fabricates renditions as small real files)
/// - Blob storage (MemoryBlobStore)
/// - Page and manager checks (MockOracle)
/// - Time (FixedClock, for token expiry without sleeping)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_video_registration() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/videos", json!({
///         "title": "Test",
///         "original_filename": "test.mov"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock encoder - shape probes, fail qualities, slow encodes
    pub encoder: Arc<MockEncoder>,
    /// Mock permission oracle - grant pages, register managers
    pub oracle: Arc<MockOracle>,
    /// In-memory blob store - seed originals, inspect artifacts
    pub blobs: Arc<MemoryBlobStore>,
    /// Media store backing the server
    pub store: Arc<dyn MediaStore>,
    /// Clock the token signer runs on
    pub clock: Arc<FixedClock>,
    /// Job scheduler (started only with [`TestConfig::start_scheduler`])
    pub scheduler: Arc<JobScheduler>,
    /// Temporary directory for the test database and pipeline scratch space
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from a test request whose body is not JSON (playlists, segments)
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks (no oracle wired,
    /// scheduler not started).
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let work_dir = temp_dir.path().join("work");

        // Create mocks
        let encoder = Arc::new(MockEncoder::new());
        let oracle = Arc::new(MockOracle::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let clock = Arc::new(FixedClock::default());

        // Create config. The dispatch loop polls every second, so tests
        // that start the scheduler settle quickly.
        let config_toml = format!(
            r#"
[auth]
signing_key = "integration-test-signing-key"
token_ttl_secs = 600

[server]
host = "127.0.0.1"
port = 8080

[database]
path = "{}"

[storage]
root = "{}"

[pipeline]
workers = 2
poll_interval_secs = 1
work_dir = "{}"
"#,
            db_path.display(),
            temp_dir.path().join("media").display(),
            work_dir.display(),
        );
        let config = load_config_from_str(&config_toml).expect("Failed to parse test config");

        // Create stores
        let store: Arc<dyn MediaStore> =
            Arc::new(SqliteMediaStore::new(&db_path).expect("Failed to create media store"));

        // Create pipeline and scheduler
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            config.encoder.clone(),
            config.pipeline.clone(),
        ));
        let scheduler = Arc::new(JobScheduler::new(
            config.pipeline.clone(),
            Arc::clone(&store),
            runner,
        ));
        if test_config.start_scheduler {
            scheduler.start().await;
        }

        // Create streaming authorization on the fixture's clock
        let signer = TokenSigner::new(
            config.auth.signing_key.clone(),
            config.auth.token_ttl_secs,
            config.auth.clock_skew_secs,
            Arc::clone(&clock) as Arc<dyn reelgate_core::Clock>,
        );
        let wired_oracle: Option<Arc<dyn PermissionOracle>> = if test_config.with_oracle {
            Some(Arc::clone(&oracle) as Arc<dyn PermissionOracle>)
        } else {
            None
        };
        let issuer = TokenIssuer::new(signer.clone(), wired_oracle.clone());
        let gate = StreamingGate::new(signer, wired_oracle.clone());

        // Create app state with mocks
        let state = Arc::new(reelgate_server::state::AppState::new(
            config,
            Arc::clone(&store),
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            Arc::clone(&scheduler),
            issuer,
            gate,
            wired_oracle,
        ));

        // Create router
        let router = reelgate_server::api::create_router(state);

        Self {
            router,
            encoder,
            oracle,
            blobs,
            store,
            clock,
            scheduler,
            temp_dir,
        }
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    /// Send a GET request with management credentials.
    pub async fn get_as(&self, path: &str, credentials: &ManagementCredentials) -> TestResponse {
        self.request("GET", path, None, Some(credentials)).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), None).await
    }

    /// Send a POST request with JSON body and management credentials.
    pub async fn post_as(
        &self,
        path: &str,
        body: Value,
        credentials: &ManagementCredentials,
    ) -> TestResponse {
        self.request("POST", path, Some(body), Some(credentials))
            .await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, None).await
    }

    /// Send a POST request without a body but with management credentials.
    pub async fn post_empty_as(
        &self,
        path: &str,
        credentials: &ManagementCredentials,
    ) -> TestResponse {
        self.request("POST", path, None, Some(credentials)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, None).await
    }

    /// Send a DELETE request with management credentials.
    pub async fn delete_as(&self, path: &str, credentials: &ManagementCredentials) -> TestResponse {
        self.request("DELETE", path, None, Some(credentials)).await
    }

    /// Send a GET request and return the raw body (for playlists/segments).
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        self.raw_request(path, None).await
    }

    /// Send a GET request with management credentials and return the raw body.
    pub async fn get_raw_as(
        &self,
        path: &str,
        credentials: &ManagementCredentials,
    ) -> RawResponse {
        self.raw_request(path, Some(credentials)).await
    }

    async fn raw_request(
        &self,
        path: &str,
        credentials: Option<&ManagementCredentials>,
    ) -> RawResponse {
        let mut request_builder = Request::builder().method("GET").uri(path);
        if let Some(credentials) = credentials {
            request_builder =
                request_builder.header(header::AUTHORIZATION, credentials.header_value());
        }
        let request = request_builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        RawResponse {
            status,
            content_type,
            body,
        }
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        credentials: Option<&ManagementCredentials>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(credentials) = credentials {
            request_builder =
                request_builder.header(header::AUTHORIZATION, credentials.header_value());
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    // =========================================================================
    // Seeding helpers
    // =========================================================================

    /// Register a video directly in the store (no job queued).
    pub fn seed_video(&self, request: &reelgate_core::CreateVideoRequest) -> Video {
        self.store
            .create_video(request.clone())
            .expect("Failed to seed video")
    }

    /// Put HLS artifacts for a video into the blob store and mark it ready.
    ///
    /// Writes a master playlist, one 720p media playlist with two segments,
    /// and one thumbnail, plus the variant row the API reports.
    pub async fn make_ready(&self, video: &Video) {
        let master = "#EXTM3U\n#EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2750000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
             720p/playlist.m3u8\n";
        let playlist = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n\
             #EXTINF:6.0,\nsegment_000.ts\n#EXTINF:6.0,\nsegment_001.ts\n#EXT-X-ENDLIST\n";

        self.blobs
            .put(&paths::master_playlist(&video.id), master.as_bytes())
            .await
            .expect("Failed to seed master playlist");
        self.blobs
            .put(&paths::playlist(&video.id, "720p"), playlist.as_bytes())
            .await
            .expect("Failed to seed media playlist");
        for idx in 0..2 {
            self.blobs
                .put(&paths::segment(&video.id, "720p", idx), b"segment-bytes")
                .await
                .expect("Failed to seed segment");
        }
        self.blobs
            .put(&paths::thumbnail(&video.id, 25), b"jpeg-bytes")
            .await
            .expect("Failed to seed thumbnail");

        self.store
            .create_variant(reelgate_core::CreateVariantRequest {
                video_id: video.id.clone(),
                quality: "720p".to_string(),
                width: 1280,
                height: 720,
                bitrate_kbps: 2500,
                path: paths::playlist(&video.id, "720p"),
                size_bytes: 1024,
            })
            .expect("Failed to seed variant");
        self.store
            .update_video_status(&video.id, VideoStatus::Ready)
            .expect("Failed to mark video ready");
    }

    /// Seed an uploaded original for a video so the pipeline can run.
    pub async fn seed_original(&self, video: &Video) {
        self.blobs
            .put(
                &paths::original(&video.id, &video.original_filename),
                b"original-bytes",
            )
            .await
            .expect("Failed to seed original");
    }

    /// Poll the store until the video reaches the given status.
    ///
    /// Panics after the timeout with the video's last observed state.
    pub async fn wait_for_video_status(
        &self,
        video_id: &str,
        status: VideoStatus,
        timeout: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last = None;
        while tokio::time::Instant::now() < deadline {
            let video = self
                .store
                .get_video(video_id)
                .expect("Failed to read video")
                .expect("Video disappeared while waiting");
            if video.status == status {
                return;
            }
            last = Some(video.status);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!(
            "Video {} did not reach {:?} within {:?} (last seen: {:?})",
            video_id, status, timeout, last
        );
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Wire the mock oracle into the server (manager auth enforced,
    /// page checks consulted)
    pub with_oracle: bool,
    /// Start the job scheduler so queued jobs are dispatched
    pub start_scheduler: bool,
}

impl TestConfig {
    /// Create config with the oracle wired in.
    pub fn with_oracle() -> Self {
        Self {
            with_oracle: true,
            start_scheduler: false,
        }
    }

    /// Create config with the scheduler started.
    pub fn with_scheduler() -> Self {
        Self {
            with_oracle: false,
            start_scheduler: true,
        }
    }

    /// Create config with both the oracle and the scheduler.
    pub fn with_all() -> Self {
        Self {
            with_oracle: true,
            start_scheduler: true,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
