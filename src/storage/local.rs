//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Scanner configuration
//! ├── pages                 # Ordered page ids
//! ├── page/
//! │   └── {id}              # Page records
//! └── html/
//!     ├── old/{id}          # Change baselines
//!     └── new/{id}          # Latest fetches
//! ```
//!
//! Each `:`-separated key segment becomes a directory level.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::KeyValueStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a key, rejecting segments that escape the root.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root_dir.clone();
        for segment in key.split(':') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\'])
            {
                return Err(AppError::storage(format!("invalid key '{key}'")));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        self.ensure_dir(&path).await?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl KeyValueStore for LocalStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        match self.read_bytes(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AppError::storage(format!("{key} is not valid UTF-8: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.write_bytes(key, value.as_bytes()).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.save("html:new:1", "hello").await.unwrap();
        let data = storage.load("html:new:1").await.unwrap();
        assert_eq!(data.as_deref(), Some("hello"));
        assert!(tmp.path().join("html/new/1").exists());
        assert!(!tmp.path().join("html/new/1.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load("page:nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_and_remove() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.save("pages", "[\"1\"]").await.unwrap();
        storage.save("pages", "[\"1\",\"2\"]").await.unwrap();
        assert_eq!(
            storage.load("pages").await.unwrap().as_deref(),
            Some("[\"1\",\"2\"]")
        );

        storage.remove("pages").await.unwrap();
        assert!(storage.load("pages").await.unwrap().is_none());

        // Removing twice is fine.
        storage.remove("pages").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        for key in ["page:..", "page:a/b", "", "html::1"] {
            assert!(
                matches!(storage.save(key, "x").await, Err(AppError::Storage(_))),
                "{key:?}"
            );
        }
    }
}
