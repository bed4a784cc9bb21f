//! Videos, variants, and transcode jobs.
//!
//! The [`MediaStore`] trait is the persistence seam; [`SqliteMediaStore`]
//! backs it with SQLite. Job state lives as tagged JSON so the scheduler can
//! filter on state type with `json_extract` and transition states with an
//! atomic compare-and-set.

mod job;
mod sqlite;
mod traits;
mod types;

pub use job::{FailureClass, Job, JobState};
pub use sqlite::SqliteMediaStore;
pub use traits::{
    CreateVariantRequest, CreateVideoRequest, JobFilter, MediaStore, StoreError, VideoFilter,
};
pub use types::{Variant, Video, VideoStatus, Visibility};
