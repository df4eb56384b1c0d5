use crate::{domain::FileStorage, errors::StorageError};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing;

/// Stores uploaded image files under a root directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| {
                format!("Failed to create upload directory '{}'", self.root.display())
            })
            .map_err(StorageError::BackendError)?;
        tracing::info!(root = %self.root.display(), "Upload directory ready");
        Ok(())
    }

    /// Keys are generated internally as `{uuid}.{ext}`, but the download key
    /// arrives from the URL, so anything path-like is refused.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && Path::new(key).components().count() == 1
            && !key.contains("..");
        if !valid {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        tracing::debug!(file_key = %key, ?content_type, "Disk: Writing file");

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(file_key = %key, "Disk: Write successful");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        let path = self.object_path(key)?;
        tracing::debug!(file_key = %key, "Disk: Reading file");

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(file_key = %key, "Disk: File not found");
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                tracing::error!(file_key = %key, error = %e, "Disk: Error reading file");
                return Err(StorageError::BackendError(
                    anyhow::Error::new(e)
                        .context(format!("Disk: Failed to read file with key '{}'", key)),
                ));
            }
        };

        let content_type = mime_guess::from_path(&path).first_raw().map(String::from);
        tracing::debug!(file_key = %key, ?content_type, "Disk: Read successful");
        Ok((data, content_type))
    }
}
