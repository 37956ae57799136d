// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

/// Blob storage for episode media, namespaced per feed
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Size of a stored blob, or [`StorageError::NotFound`]
    async fn size(&self, feed_id: &str, name: &str) -> Result<u64, StorageError>;

    /// Store the file at `source` as `name`, returning the bytes written
    async fn create(&self, feed_id: &str, name: &str, source: &Path) -> Result<u64, StorageError>;

    /// Remove a blob; removing a missing blob succeeds
    async fn delete(&self, feed_id: &str, name: &str) -> Result<(), StorageError>;
}

/// Storage rooted at a local directory: `<root>/<feed_id>/<name>`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, feed_id: &str, name: &str) -> PathBuf {
        self.root
            .join(sanitize_filename::sanitize(feed_id))
            .join(sanitize_filename::sanitize(name))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn size(&self, feed_id: &str, name: &str) -> Result<u64, StorageError> {
        let path = self.path(feed_id, name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                feed_id: feed_id.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn create(&self, feed_id: &str, name: &str, source: &Path) -> Result<u64, StorageError> {
        let path = self.path(feed_id, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }

        // Copy under a .partial name so readers never see a half-written episode
        let partial = path.with_extension(format!(
            "{}.partial",
            path.extension().and_then(|e| e.to_str()).unwrap_or_default()
        ));

        let written = match tokio::fs::copy(source, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(io_error(source)(e));
            }
        };

        tokio::fs::rename(&partial, &path)
            .await
            .map_err(io_error(&path))?;

        debug!(path = %path.display(), bytes = written, "stored file");
        Ok(written)
    }

    async fn delete(&self, feed_id: &str, name: &str) -> Result<(), StorageError> {
        let path = self.path(feed_id, name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn size_of_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = storage.size("feed", "ep.mp3").await.unwrap_err();

        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_copies_and_reports_size() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.mp3");
        std::fs::write(&source, b"twelve bytes").unwrap();
        let storage = LocalStorage::new(dir.path().join("data"));

        let written = storage.create("feed", "ep.mp3", &source).await.unwrap();

        assert_eq!(written, 12);
        assert_eq!(storage.size("feed", "ep.mp3").await.unwrap(), 12);
        let stored = dir.path().join("data").join("feed").join("ep.mp3");
        assert_eq!(std::fs::read(&stored).unwrap(), b"twelve bytes");
        assert!(!dir.path().join("data/feed/ep.mp3.partial").exists());
    }

    #[tokio::test]
    async fn create_from_missing_source_fails_cleanly() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let result = storage
            .create("feed", "ep.mp3", &dir.path().join("nope.mp3"))
            .await;

        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert!(!dir.path().join("feed/ep.mp3.partial").exists());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.mp3");
        std::fs::write(&source, b"x").unwrap();
        let storage = LocalStorage::new(dir.path().join("data"));
        storage.create("feed", "ep.mp3", &source).await.unwrap();

        storage.delete("feed", "ep.mp3").await.unwrap();
        storage.delete("feed", "ep.mp3").await.unwrap();

        assert!(matches!(
            storage.size("feed", "ep.mp3").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
