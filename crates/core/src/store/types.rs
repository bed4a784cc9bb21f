//! Core media data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a video.
///
/// Mutated only by the pipeline and scheduler: `Pending` on registration,
/// `Processing` while a job runs, `Ready` once at least one variant exists,
/// `Failed` when a job exhausts its options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl VideoStatus {
    /// Returns the status as a string (for filtering and storage).
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VideoStatus::Pending),
            "processing" => Some(VideoStatus::Processing),
            "ready" => Some(VideoStatus::Ready),
            "failed" => Some(VideoStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who may watch a video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Anyone with the URL, no token required.
    Public,
    /// Same as public but excluded from listings.
    Unlisted,
    /// Requires a viewer token scoped to the linked document page.
    PageProtected,
    /// Management credentials only; viewer tokens are never accepted.
    Private,
}

impl Visibility {
    /// Returns the visibility as a string (for filtering and storage).
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::PageProtected => "page_protected",
            Visibility::Private => "private",
        }
    }

    /// Parses a visibility from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "unlisted" => Some(Visibility::Unlisted),
            "page_protected" => Some(Visibility::PageProtected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    /// Returns true if playback requires no credentials at all.
    pub fn is_open(&self) -> bool {
        matches!(self, Visibility::Public | Visibility::Unlisted)
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded video and its processing status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    /// Unique identifier (UUID).
    pub id: String,

    /// Display title.
    pub title: String,

    /// Filename of the uploaded original.
    pub original_filename: String,

    /// Duration in seconds, known after the probe stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    /// Current processing status.
    pub status: VideoStatus,

    /// Linked document page, when the video belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<i64>,

    /// User who registered the video.
    pub uploaded_by: String,

    /// Access policy.
    pub visibility: Visibility,

    /// When the video was registered.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Returns true if the video has streamable variants.
    pub fn is_ready(&self) -> bool {
        self.status == VideoStatus::Ready
    }
}

/// One streamable rendition of a video.
///
/// Created only on transcode success; immutable afterwards. A preset that
/// failed all its attempts produces no row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    /// Unique identifier (UUID).
    pub id: String,

    /// Owning video.
    pub video_id: String,

    /// Quality label, e.g. "720p".
    pub quality: String,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Target video bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Storage path of the variant's media playlist.
    pub path: String,

    /// Total size of the rendition in bytes.
    pub size_bytes: u64,

    /// When the variant was created.
    pub created_at: DateTime<Utc>,
}
