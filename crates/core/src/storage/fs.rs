//! File system blob store implementation.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::error::StorageError;
use super::traits::BlobStore;

/// Blob store backed by a local directory tree.
///
/// Blob paths map directly to files under the root; parent directories are
/// created on write.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a new store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a blob path against the root, rejecting anything that could
    /// escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        if path.is_empty() || path.starts_with('/') {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
            });
        }
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidPath {
                        path: path.to_string(),
                    })
                }
            }
        }
        Ok(self.root.join(relative))
    }

    /// Collects files under `dir` into `out` as root-relative blob paths.
    async fn walk(&self, dir: PathBuf, out: &mut Vec<String>) -> Result<(), std::io::Error> {
        let mut pending = vec![dir];
        while let Some(current) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(entry_path);
                } else if let Ok(relative) = entry_path.strip_prefix(&self.root) {
                    // Blob paths are '/'-separated regardless of platform
                    let parts: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    out.push(parts.join("/"));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    path: path.to_string(),
                    source: e,
                })?;
        }
        fs::write(&full, bytes)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                source: e,
            })?;
        debug!(path, bytes = bytes.len(), "wrote blob");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(StorageError::ReadFailed {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // A prefix may name a directory, a file, or a partial file name; walk
        // the deepest existing directory and filter by string prefix.
        let anchor = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let dir = if anchor.is_empty() {
            self.root.clone()
        } else {
            self.resolve(anchor)?
        };

        let mut all = Vec::new();
        self.walk(dir, &mut all)
            .await
            .map_err(|e| StorageError::ListFailed {
                prefix: prefix.to_string(),
                source: e,
            })?;

        let mut matched: Vec<String> = all
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        Ok(fs::metadata(&full).await.is_ok())
    }
}
