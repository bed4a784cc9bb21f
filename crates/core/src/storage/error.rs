//! Error types for the storage module.

use thiserror::Error;

/// Errors that can occur when reading or writing blobs.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Blob does not exist.
    #[error("Blob not found: {path}")]
    NotFound { path: String },

    /// Path is empty, absolute, or contains parent traversal.
    #[error("Invalid blob path: {path}")]
    InvalidPath { path: String },

    /// Failed to write a blob.
    #[error("Failed to write blob {path}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a blob.
    #[error("Failed to read blob {path}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to list a prefix.
    #[error("Failed to list prefix {prefix}")]
    ListFailed {
        prefix: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a blob.
    #[error("Failed to delete blob {path}")]
    DeleteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Whether this error is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WriteFailed { .. }
                | Self::ReadFailed { .. }
                | Self::ListFailed { .. }
                | Self::DeleteFailed { .. }
        )
    }
}
