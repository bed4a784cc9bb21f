//! Media storage trait and request/filter types.

use std::fmt;

use crate::store::{Job, JobState, Variant, Video, VideoStatus, Visibility};

/// Error type for media store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Video not found.
    VideoNotFound(String),
    /// Job not found.
    JobNotFound(String),
    /// An active job already exists for the video.
    Conflict {
        video_id: String,
        active_job_id: String,
    },
    /// Cannot perform operation due to current state.
    InvalidState {
        job_id: String,
        current_state: String,
        operation: String,
    },
    /// Database error.
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::VideoNotFound(id) => write!(f, "Video not found: {}", id),
            StoreError::JobNotFound(id) => write!(f, "Job not found: {}", id),
            StoreError::Conflict {
                video_id,
                active_job_id,
            } => write!(
                f,
                "Video {} already has an active job: {}",
                video_id, active_job_id
            ),
            StoreError::InvalidState {
                job_id,
                current_state,
                operation,
            } => write!(
                f,
                "Cannot {} job {}: current state is {}",
                operation, job_id, current_state
            ),
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Request to register a new video.
#[derive(Debug, Clone)]
pub struct CreateVideoRequest {
    /// Display title.
    pub title: String,
    /// Filename of the uploaded original.
    pub original_filename: String,
    /// User registering the video.
    pub uploaded_by: String,
    /// Access policy.
    pub visibility: Visibility,
    /// Linked document page, if any.
    pub page_id: Option<i64>,
}

/// Request to record a successful rendition.
#[derive(Debug, Clone)]
pub struct CreateVariantRequest {
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
}

/// Filter for querying videos.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Filter by status.
    pub status: Option<VideoStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl VideoFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: VideoStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Filter by state type.
    pub state: Option<String>,
    /// Filter by video.
    pub video_id: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            state: None,
            video_id: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by state type.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Filter by video.
    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for media storage backends (videos, variants, jobs).
pub trait MediaStore: Send + Sync {
    // ------------------------------------------------------------------
    // Videos
    // ------------------------------------------------------------------

    /// Register a new video with status `Pending`.
    fn create_video(&self, request: CreateVideoRequest) -> Result<Video, StoreError>;

    /// Get a video by ID.
    fn get_video(&self, id: &str) -> Result<Option<Video>, StoreError>;

    /// List videos matching the filter, newest first.
    fn list_videos(&self, filter: &VideoFilter) -> Result<Vec<Video>, StoreError>;

    /// Update a video's processing status.
    fn update_video_status(&self, id: &str, status: VideoStatus) -> Result<Video, StoreError>;

    /// Record the duration discovered by the probe stage.
    fn set_video_duration(&self, id: &str, duration_secs: f64) -> Result<Video, StoreError>;

    /// Permanently delete a video together with its jobs and variants.
    /// Returns the deleted video if found.
    fn delete_video(&self, id: &str) -> Result<Video, StoreError>;

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Create a queued job for a video.
    ///
    /// Fails with `Conflict` if the video already has a non-terminal job.
    /// The attempt number is one past the video's existing job count.
    fn create_job(&self, video_id: &str) -> Result<Job, StoreError>;

    /// Get a job by ID.
    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// List jobs matching the filter, newest first.
    fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError>;

    /// The non-terminal job for a video, if one exists.
    fn active_job_for_video(&self, video_id: &str) -> Result<Option<Job>, StoreError>;

    /// The oldest queued job, for FIFO dispatch.
    fn next_queued_job(&self) -> Result<Option<Job>, StoreError>;

    /// All jobs currently in a processing-stage state, for orphan recovery.
    fn processing_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Number of jobs ever created for a video.
    fn attempts_for_video(&self, video_id: &str) -> Result<u32, StoreError>;

    /// Atomically transition a job from an expected state type to a new state.
    ///
    /// Compare-and-set: fails with `InvalidState` if the job's current state
    /// type is not `expected`, so a stale worker cannot resurrect a job that
    /// was cancelled or failed underneath it.
    fn transition_job(
        &self,
        id: &str,
        expected: &str,
        new_state: JobState,
    ) -> Result<Job, StoreError>;

    /// Update a job's progress. Regressions are clamped: the stored value
    /// never decreases.
    fn update_job_progress(&self, id: &str, progress: u8) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Variants
    // ------------------------------------------------------------------

    /// Record a successful rendition.
    fn create_variant(&self, request: CreateVariantRequest) -> Result<Variant, StoreError>;

    /// All variants for a video, tallest first.
    fn variants_for_video(&self, video_id: &str) -> Result<Vec<Variant>, StoreError>;
}
