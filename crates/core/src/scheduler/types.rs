//! Types for the job scheduler.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Video not found.
    #[error("video not found: {0}")]
    VideoNotFound(String),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The video already has a job that is not yet terminal.
    #[error("video {video_id} already has an active job: {active_job_id}")]
    Conflict {
        video_id: String,
        active_job_id: String,
    },

    /// The job's current state does not permit the operation.
    #[error("cannot {operation} job {job_id}: current state is {current_state}")]
    InvalidState {
        job_id: String,
        current_state: String,
        operation: String,
    },

    /// Media store error.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VideoNotFound(id) => SchedulerError::VideoNotFound(id),
            StoreError::JobNotFound(id) => SchedulerError::JobNotFound(id),
            StoreError::Conflict {
                video_id,
                active_job_id,
            } => SchedulerError::Conflict {
                video_id,
                active_job_id,
            },
            StoreError::InvalidState {
                job_id,
                current_state,
                operation,
            } => SchedulerError::InvalidState {
                job_id,
                current_state,
                operation,
            },
            other => SchedulerError::Store(other),
        }
    }
}

/// A live worker claim on a dispatched job.
///
/// Holds the cancel flag shared with the worker; a claim exists from dispatch
/// until the worker task finishes, so a processing-state job with no claim is
/// an orphan.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    /// Job being executed.
    pub job_id: String,
    /// Video the job belongs to.
    pub video_id: String,
    /// Attempt number.
    pub attempt: u32,
    /// When the worker was dispatched.
    pub started_at: DateTime<Utc>,
    /// Cooperative cancel flag, checked by the worker between sub-steps.
    pub cancel: Arc<AtomicBool>,
}

/// Current status of the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether the dispatch loop is running.
    pub running: bool,
    /// Worker pool size.
    pub workers: usize,
    /// Jobs currently held by a worker.
    pub active_jobs: usize,
    /// Jobs waiting for a free worker.
    pub queued_count: usize,
    /// Jobs in a processing-stage state.
    pub processing_count: usize,
}
