//! Transcode pipeline for a single job.
//!
//! A job moves through four ordered stages:
//! - **Probe**: read duration, codec, and resolution from the original
//! - **Transcode**: produce one MP4 rendition per applicable preset
//! - **Package**: segment renditions into playlists and chunks
//! - **Thumbnail**: extract still frames
//!
//! Stages survey existing artifacts before doing work, so a retried job
//! picks up where the previous attempt left off.

mod artifacts;
pub mod manifest;
mod progress;
mod runner;

pub use artifacts::ArtifactSurvey;
pub use progress::{overall_percent, ProgressTracker, Stage};
pub use runner::{JobRunner, PipelineError};
