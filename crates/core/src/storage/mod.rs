//! Storage gateway for video artifacts.
//!
//! The pipeline reads and writes every artifact (original upload, encoded
//! renditions, segments, playlists, thumbnails) through the [`BlobStore`]
//! contract: `put`, `get`, `list`, `delete` over relative '/'-separated
//! paths. The [`paths`] module owns the path scheme; [`FsBlobStore`] is the
//! local-disk implementation.

mod error;
mod fs;
pub mod paths;
mod traits;

pub use error::StorageError;
pub use fs::FsBlobStore;
pub use traits::BlobStore;
