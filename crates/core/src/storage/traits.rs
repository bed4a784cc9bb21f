//! Trait definitions for the storage module.

use async_trait::async_trait;

use super::error::StorageError;

/// Content-addressable blob storage for originals, renditions, segments,
/// playlists, and thumbnails.
///
/// Paths are relative, '/'-separated, and always rooted at a video id
/// (see [`super::paths`]). Implementations own durability; callers own
/// retry policy.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the name of this storage implementation.
    fn name(&self) -> &str;

    /// Writes a blob, replacing any existing content at the path.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Reads a blob. Returns [`StorageError::NotFound`] if it does not exist.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Lists all blob paths under a prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Deletes a blob. Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Whether a blob exists at the exact path.
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.list(path).await?.iter().any(|p| p == path))
    }

    /// Deletes every blob under a prefix, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let paths = self.list(prefix).await?;
        for path in &paths {
            self.delete(path).await?;
        }
        Ok(paths.len())
    }
}
