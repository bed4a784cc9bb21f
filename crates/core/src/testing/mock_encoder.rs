//! Mock encoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::encoder::{
    EncodeOutput, EncodeProgress, EncodeRequest, Encoder, EncoderError, FrameRequest, MediaInfo,
    SegmentOutput, SegmentRequest,
};

/// A recorded encode invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// Quality that was requested.
    pub quality: String,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// Mock implementation of the Encoder trait.
///
/// Fabricates renditions, segments, and thumbnails as small real files so
/// pipeline code that reads encoder output from disk works unchanged.
/// Behavior is controllable:
/// - Shape the probed source (resolution, duration)
/// - Fail specific qualities persistently, or the next call once
/// - Slow encodes down to open cancellation windows
/// - Record encode invocations for assertions
#[derive(Debug)]
pub struct MockEncoder {
    /// Probed source properties returned for unknown paths.
    default_info: Arc<RwLock<MediaInfo>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EncoderError>>>,
    /// Qualities whose encodes always fail.
    failing_qualities: Arc<RwLock<HashSet<String>>>,
    /// Simulated encode duration in milliseconds.
    encode_delay_ms: Arc<RwLock<u64>>,
    /// Whether to send progress updates during encodes.
    send_progress: Arc<RwLock<bool>>,
    /// Recorded encode invocations.
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a new mock encoder probing as a 1080p source.
    pub fn new() -> Self {
        Self {
            default_info: Arc::new(RwLock::new(Self::source_info(1080, 120.0))),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            failing_qualities: Arc::new(RwLock::new(HashSet::new())),
            encode_delay_ms: Arc::new(RwLock::new(0)),
            send_progress: Arc::new(RwLock::new(false)),
            encodes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Shape the default probe result as a 16:9 source of the given height.
    pub async fn set_source(&self, height: u32, duration_secs: f64) {
        *self.default_info.write().await = Self::source_info(height, duration_secs);
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: EncoderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every encode of the given quality fail.
    pub async fn fail_quality(&self, quality: &str) {
        self.failing_qualities
            .write()
            .await
            .insert(quality.to_string());
    }

    /// Clear per-quality failures.
    pub async fn clear_failing_qualities(&self) {
        self.failing_qualities.write().await.clear();
    }

    /// Set the simulated encode duration.
    pub async fn set_encode_delay(&self, delay: Duration) {
        *self.encode_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Enable or disable progress updates during encodes.
    pub async fn set_send_progress(&self, send: bool) {
        *self.send_progress.write().await = send;
    }

    /// Get all recorded encode invocations.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Get the number of encode invocations.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<EncoderError> {
        self.next_error.write().await.take()
    }

    fn source_info(height: u32, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: PathBuf::new(),
            size_bytes: 64 * 1024 * 1024,
            duration_secs,
            format: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            width: Some(height * 16 / 9),
            height: Some(height),
            fps: Some(30.0),
            audio_codec: Some("aac".to_string()),
            audio_bitrate_kbps: Some(128),
        }
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }

        let mut info = self.default_info.read().await.clone();
        info.path = path.to_path_buf();
        Ok(info)
    }

    async fn encode(&self, request: EncodeRequest) -> Result<EncodeOutput, EncoderError> {
        let quality = request.target.quality.clone();

        if let Some(err) = self.take_error().await {
            self.encodes.write().await.push(RecordedEncode {
                quality,
                success: false,
            });
            return Err(err);
        }

        if self.failing_qualities.read().await.contains(&quality) {
            self.encodes.write().await.push(RecordedEncode {
                quality,
                success: false,
            });
            return Err(EncoderError::encode_failed(
                "scripted encode failure",
                None,
            ));
        }

        let delay_ms = *self.encode_delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&request.output_path, b"rendition-bytes").await?;

        self.encodes.write().await.push(RecordedEncode {
            quality,
            success: true,
        });

        Ok(EncodeOutput {
            output_path: request.output_path,
            size_bytes: 15,
            duration_ms: delay_ms,
        })
    }

    async fn encode_with_progress(
        &self,
        request: EncodeRequest,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<EncodeOutput, EncoderError> {
        if *self.send_progress.read().await {
            for percent in [25.0f32, 50.0, 75.0, 100.0] {
                let _ = progress_tx
                    .send(EncodeProgress {
                        job_id: request.job_id.clone(),
                        quality: request.target.quality.clone(),
                        percent,
                        time_secs: percent as f64,
                        speed: Some("10x".to_string()),
                    })
                    .await;
            }
        }

        self.encode(request).await
    }

    async fn segment(&self, request: SegmentRequest) -> Result<SegmentOutput, EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let mut segment_paths = Vec::new();
        for idx in 0..2u32 {
            let seg = request.output_dir.join(format!("segment_{:03}.ts", idx));
            tokio::fs::write(&seg, b"segment-bytes").await?;
            segment_paths.push(seg);
        }
        let playlist_path = request.output_dir.join("playlist.m3u8");
        let playlist = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n\
             #EXTINF:{}.0,\nsegment_000.ts\n#EXTINF:{}.0,\nsegment_001.ts\n\
             #EXT-X-ENDLIST\n",
            request.segment_secs, request.segment_secs, request.segment_secs
        );
        tokio::fs::write(&playlist_path, playlist.as_bytes()).await?;

        Ok(SegmentOutput {
            playlist_path,
            segment_paths,
        })
    }

    async fn extract_frame(&self, request: FrameRequest) -> Result<(), EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&request.output_path, b"jpeg-bytes").await?;
        Ok(())
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}
