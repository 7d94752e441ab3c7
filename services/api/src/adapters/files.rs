//! services/api/src/adapters/files.rs
//!
//! Disk-backed implementation of the `FileStore` port. Uploaded blobs are
//! written under a single root directory and addressed by generated file ids;
//! the web layer serves the same directory at `/files`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use visual_journal_core::domain::StoredFile;
use visual_journal_core::ports::{FileStore, PortError, PortResult};

/// A blob store that keeps uploaded media on the local filesystem.
#[derive(Clone)]
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The stored filename carries the subtype of the MIME type as its
    /// extension, e.g. `image/jpeg` -> `.jpeg`.
    fn extension_for(mime: &str) -> &str {
        mime.split('/').nth(1).filter(|s| !s.is_empty()).unwrap_or("bin")
    }

    /// File ids are plain filenames; anything that looks like a path is
    /// refused before it reaches the filesystem.
    fn resolve(&self, file_id: &str) -> PortResult<PathBuf> {
        let name = Path::new(file_id)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| *n == file_id && !file_id.contains(".."))
            .ok_or_else(|| PortError::NotFound(format!("File {} not found", file_id)))?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn put(&self, bytes: &[u8], mime: &str) -> PortResult<StoredFile> {
        let id = format!("{}.{}", Uuid::new_v4(), Self::extension_for(mime));
        let path = self.root.join(&id);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to store file: {}", e)))?;
        let url = format!("/files/{}", id);
        Ok(StoredFile { id, url })
    }

    async fn read(&self, file_id: &str) -> PortResult<Vec<u8>> {
        let path = self.resolve(file_id)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PortError::NotFound(format!("File {} not found", file_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path()).unwrap();

        let stored = store.put(b"jpeg bytes", "image/jpeg").await.unwrap();
        assert!(stored.id.ends_with(".jpeg"));
        assert_eq!(stored.url, format!("/files/{}", stored.id));

        let bytes = store.read(&stored.id).await.unwrap();
        assert_eq!(bytes, b"jpeg bytes");
    }

    #[tokio::test]
    async fn path_traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path()).unwrap();

        assert!(store.read("../secret.txt").await.is_err());
        assert!(store.read("a/b.png").await.is_err());
    }

    #[test]
    fn extension_falls_back_for_odd_mime_types() {
        assert_eq!(DiskFileStore::extension_for("video/webm"), "webm");
        assert_eq!(DiskFileStore::extension_for("nonsense"), "bin");
    }
}
