//! services/api/src/adapters/storage.rs
//!
//! Stores book files on the local filesystem. Implements the `FileStorage` port.

use async_trait::async_trait;
use bookflow_core::ports::{FileStorage, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Keeps each object at `<root>/<reference>`. References are relative paths such as
/// `private/<owner>/<id>.pdf`.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory if needed.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn resolve(&self, reference: &str) -> PortResult<PathBuf> {
        let relative = Path::new(reference);
        let is_plain = !reference.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(PortError::NotFound(format!("invalid storage reference '{}'", reference)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, path_hint: &str, bytes: &[u8], content_type: &str) -> PortResult<String> {
        let path = self.resolve(path_hint)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unavailable(format!("Failed to prepare storage: {}", e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Unavailable(format!("Failed to upload file to storage: {}", e)))?;
        debug!("Stored {} bytes ({}) at {}", bytes.len(), content_type, path_hint);
        Ok(path_hint.to_string())
    }

    async fn get(&self, reference: &str) -> PortResult<Vec<u8>> {
        let path = self.resolve(reference)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PortError::NotFound(reference.to_string()),
            _ => PortError::Unavailable(e.to_string()),
        })
    }

    async fn delete(&self, reference: &str) -> bool {
        let Ok(path) = self.resolve(reference) else {
            return false;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to delete {} from storage: {}", reference, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        let reference = storage
            .put("private/u1/book.pdf", b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();
        assert_eq!(reference, "private/u1/book.pdf");
        assert!(dir.path().join("private/u1/book.pdf").exists());
        assert_eq!(storage.get(&reference).await.unwrap(), b"%PDF-1.4");

        assert!(storage.delete(&reference).await);
        assert!(matches!(storage.get(&reference).await, Err(PortError::NotFound(_))));
        // Already gone counts as deleted.
        assert!(storage.delete(&reference).await);
    }

    #[tokio::test]
    async fn rejects_paths_escaping_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().join("root"));

        assert!(storage.put("../outside.pdf", b"x", "application/pdf").await.is_err());
        assert!(storage.put("/etc/passwd", b"x", "application/pdf").await.is_err());
        assert!(!storage.delete("public/../../x").await);
        assert!(!dir.path().join("outside.pdf").exists());
    }
}
