//! Transcode job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a job failure.
///
/// Surfaced instead of raw encoder output so callers can reason about what
/// went wrong without parsing tool logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Corrupt or unreadable upload. Terminal.
    Input,
    /// The encoder failed after its retries were exhausted.
    Encoder,
    /// Storage reads/writes failed after backoff.
    Storage,
    /// Cancelled by an operator.
    Cancelled,
    /// Anything else (crashed worker past the attempt cap, bugs).
    Internal,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Input => write!(f, "input"),
            FailureClass::Encoder => write!(f, "encoder"),
            FailureClass::Storage => write!(f, "storage"),
            FailureClass::Cancelled => write!(f, "cancelled"),
            FailureClass::Internal => write!(f, "internal"),
        }
    }
}

/// Current state of a transcode job.
///
/// State machine flow:
/// ```text
/// Queued -> Probing -> Transcoding -> Packaging -> Thumbnailing -> Completed
///
/// Any non-terminal state can transition to Failed. Transitions are strictly
/// forward; no stage is skipped. Cancellation is a Failed state with class
/// "cancelled".
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobState {
    /// Job created, waiting for a worker.
    Queued,

    /// Extracting duration, codec, and resolution from the original.
    Probing { started_at: DateTime<Utc> },

    /// Producing one rendition per applicable preset.
    Transcoding {
        /// Number of presets planned for this source.
        presets_total: u32,
        /// Presets finished (succeeded or abandoned).
        presets_done: u32,
        /// Preset currently being encoded.
        current_preset: String,
        started_at: DateTime<Utc>,
    },

    /// Segmenting renditions into playlists and chunks.
    Packaging {
        /// Renditions that survived the transcode stage.
        renditions_total: u32,
        /// Renditions already segmented.
        renditions_packaged: u32,
        started_at: DateTime<Utc>,
    },

    /// Extracting still frames.
    Thumbnailing {
        frames_total: u32,
        frames_done: u32,
        started_at: DateTime<Utc>,
    },

    /// Job finished with at least one variant (terminal).
    Completed {
        completed_at: DateTime<Utc>,
        /// Variants created by this job.
        variants_created: u32,
    },

    /// Job failed (terminal).
    Failed {
        /// Short human-readable error.
        error: String,
        /// Failure classification.
        class: FailureClass,
        /// Whether a fresh attempt may succeed.
        retryable: bool,
        /// Attempt number that failed.
        attempt: u32,
        failed_at: DateTime<Utc>,
    },
}

impl JobState {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }

    /// Returns true if a worker is actively running a stage.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Probing { .. }
                | JobState::Transcoding { .. }
                | JobState::Packaging { .. }
                | JobState::Thumbnailing { .. }
        )
    }

    /// Returns true if the job still occupies the one-active-job slot for its
    /// video.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the job can be cancelled from this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns the failure classification if the job failed.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            JobState::Failed { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// Returns the state type as a string (for filtering).
    pub fn state_type(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Probing { .. } => "probing",
            JobState::Transcoding { .. } => "transcoding",
            JobState::Packaging { .. } => "packaging",
            JobState::Thumbnailing { .. } => "thumbnailing",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }

    /// Builds a cancellation state for the given attempt.
    pub fn cancelled(attempt: u32, now: DateTime<Utc>) -> Self {
        JobState::Failed {
            error: "cancelled".to_string(),
            class: FailureClass::Cancelled,
            retryable: false,
            attempt,
            failed_at: now,
        }
    }
}

/// A transcode job for one video.
///
/// Retries create new job rows; old attempts remain as history. At most one
/// job per video is in a non-terminal state at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Unique identifier (UUID).
    pub id: String,

    /// Video being processed.
    pub video_id: String,

    /// Attempt number for this video (1-indexed).
    pub attempt: u32,

    /// Overall progress, 0-100. Monotonically non-decreasing.
    pub progress: u8,

    /// Current state.
    pub state: JobState,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
