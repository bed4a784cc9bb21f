//! In-memory blob store for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{BlobStore, StorageError};

/// Mock implementation of the BlobStore trait backed by a map.
///
/// Seed it through the trait's `put`, inspect it with the helpers, and
/// script the next operation to fail for fault handling tests.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<StorageError>>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    /// Create a new empty blob store.
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(BTreeMap::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Whether a blob exists at the exact path.
    pub async fn contains(&self, path: &str) -> bool {
        self.blobs.read().await.contains_key(path)
    }

    /// Read a blob without going through the trait (no scripted errors).
    pub async fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(path).cloned()
    }

    /// Total number of stored blobs.
    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// All stored paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: StorageError) {
        *self.next_error.write().await = Some(error);
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<StorageError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.blobs
            .write()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.blobs.write().await.remove(path);
        Ok(())
    }
}
