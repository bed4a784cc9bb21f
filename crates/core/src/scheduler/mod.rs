//! Transcode job scheduling.
//!
//! [`JobScheduler`] owns admission (one active job per video), a bounded
//! worker pool, cancellation, and orphan recovery after a restart. The
//! per-job stage work is delegated to [`crate::pipeline::JobRunner`].

mod runner;
mod types;

pub use runner::JobScheduler;
pub use types::{ActiveJob, SchedulerError, SchedulerStatus};
