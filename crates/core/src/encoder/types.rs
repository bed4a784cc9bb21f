//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about a media file, extracted by probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Container format (e.g., "mov", "matroska").
    pub format: String,
    /// Video codec.
    pub video_codec: Option<String>,
    /// Video width in pixels.
    pub width: Option<u32>,
    /// Video height in pixels.
    pub height: Option<u32>,
    /// Video frame rate.
    pub fps: Option<f32>,
    /// Audio codec (if an audio stream is present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbps (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate_kbps: Option<u32>,
}

impl MediaInfo {
    /// Width of a rendition scaled to `target_height`, keeping aspect ratio
    /// and rounding to the next even number (encoder requirement).
    pub fn scaled_width(&self, target_height: u32) -> Option<u32> {
        let (w, h) = (self.width?, self.height?);
        if h == 0 {
            return None;
        }
        let scaled = (w as f64 * target_height as f64 / h as f64).round() as u32;
        Some((scaled + 1) & !1)
    }
}

/// One rendition to produce: a preset clamped against the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTarget {
    /// Quality label (e.g., "720p").
    pub quality: String,
    /// Output height in pixels; never exceeds the source height.
    pub height: u32,
    /// Target video bitrate in kbps.
    pub video_bitrate_kbps: u32,
    /// Target audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

/// A single-rendition encode request.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    /// Job id the invocation belongs to (for logs and progress).
    pub job_id: String,
    /// Input file path.
    pub input_path: PathBuf,
    /// Output rendition path.
    pub output_path: PathBuf,
    /// The rendition to produce.
    pub target: EncodeTarget,
}

/// Result of a successful encode.
#[derive(Debug, Clone)]
pub struct EncodeOutput {
    /// Output rendition path.
    pub output_path: PathBuf,
    /// Output file size in bytes.
    pub size_bytes: u64,
    /// Wall-clock encode duration in milliseconds.
    pub duration_ms: u64,
}

/// Progress update during an encode.
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    /// Job id.
    pub job_id: String,
    /// Quality being encoded.
    pub quality: String,
    /// Progress percentage (0.0 - 100.0).
    pub percent: f32,
    /// Media time processed so far in seconds.
    pub time_secs: f64,
    /// Current processing speed (e.g., "1.5x").
    pub speed: Option<String>,
}

/// Request to split a rendition into fixed-duration segments plus a media
/// playlist.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    /// Job id.
    pub job_id: String,
    /// Rendition to segment.
    pub input_path: PathBuf,
    /// Directory receiving `playlist.m3u8` and `segment_NNN.ts` files.
    pub output_dir: PathBuf,
    /// Target segment duration in seconds.
    pub segment_secs: u32,
}

/// Result of segmenting one rendition.
#[derive(Debug, Clone)]
pub struct SegmentOutput {
    /// Media playlist written by the segmenter.
    pub playlist_path: PathBuf,
    /// Segment files in playback order.
    pub segment_paths: Vec<PathBuf>,
}

/// Request to extract one still frame.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    /// Job id.
    pub job_id: String,
    /// Input file path.
    pub input_path: PathBuf,
    /// Output JPEG path.
    pub output_path: PathBuf,
    /// Offset into the media in seconds.
    pub offset_secs: f64,
}
