//! Filesystem blob store for uploaded documents, gallery images and digital
//! product files.
//!
//! Stored paths are relative to `storage.upload_dir` and never leave it.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::shared::error::AppError;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid stored path: {0}")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(format!("File {} not found", path)),
            StorageError::InvalidPath(path) => AppError::BadRequest(format!("Invalid path {}", path)),
            StorageError::Io(e) => AppError::Internal(format!("File storage error: {}", e)),
        }
    }
}

/// Blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `folder` with a generated name keeping the
    /// original extension. Returns the stored path.
    pub async fn save(
        &self,
        folder: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let folder = folder.trim_matches('/');
        if folder.is_empty() || !is_safe_relative(folder) {
            return Err(StorageError::InvalidPath(folder.to_string()));
        }

        let stored_path = match file_extension(original_name) {
            Some(ext) => format!("{}/{}.{}", folder, Uuid::now_v7(), ext),
            None => format!("{}/{}", folder, Uuid::now_v7()),
        };

        let full = self.resolve(&stored_path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, bytes).await?;

        tracing::debug!(path = %stored_path, size = bytes.len(), "Stored file");
        Ok(stored_path)
    }

    /// Read a stored file.
    pub async fn read(&self, stored_path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(stored_path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(stored_path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file. Missing files are not an error.
    pub async fn delete(&self, stored_path: &str) -> Result<(), StorageError> {
        let full = self.resolve(stored_path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute location of a stored path; rejects anything escaping the root.
    pub fn resolve(&self, stored_path: &str) -> Result<PathBuf, StorageError> {
        if stored_path.is_empty() || !is_safe_relative(stored_path) {
            return Err(StorageError::InvalidPath(stored_path.to_string()));
        }
        Ok(self.root.join(stored_path))
    }
}

fn is_safe_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Lowercased alphanumeric extension of an uploaded file name.
fn file_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 10 || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// File name safe to put in a `Content-Disposition` header.
pub fn download_file_name(name: &str) -> String {
    let cleaned: String = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FileStore {
        FileStore::new(std::env::temp_dir().join(format!("storefront-test-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let store = temp_store();
        let path = store.save("documents", "Price List.PDF", b"%PDF").await.unwrap();

        assert!(path.starts_with("documents/"));
        assert!(path.ends_with(".pdf"));
        assert_eq!(store.read(&path).await.unwrap(), b"%PDF");

        store.delete(&path).await.unwrap();
        assert!(matches!(store.read(&path).await, Err(StorageError::NotFound(_))));
        // deleting twice is fine
        store.delete(&path).await.unwrap();

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_paths_cannot_escape_root() {
        let store = FileStore::new("/srv/uploads");

        assert!(store.resolve("../etc/passwd").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("documents/../../x").is_err());
        assert!(store.resolve("").is_err());
        assert_eq!(
            store.resolve("gallery/a.png").unwrap(),
            PathBuf::from("/srv/uploads/gallery/a.png")
        );
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name("report \"final\".pdf"), "report _final_.pdf");
        assert_eq!(download_file_name("../../secret.txt"), "secret.txt");
        assert_eq!(download_file_name(""), "download");
    }
}
