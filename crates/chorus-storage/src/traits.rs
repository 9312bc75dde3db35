//! Storage abstraction trait
//!
//! This module defines the MediaStore trait that all storage backends must
//! implement. The pipelines address objects by storage key; job rows carry
//! public URLs, so backends also translate between the two.

use async_trait::async_trait;
use thiserror::Error;

use chorus_core::{PipelineError, StorageBackend};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait so
/// the pipelines stay decoupled from backend details.
///
/// **Key format:** see [`crate::keys::generate_media_key`]. Keys never
/// contain `..` or a leading `/`.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Download an object by its storage key.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Upload data under a specific storage key. Returns the public URL for
    /// the uploaded object.
    async fn upload(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Delete an object by its storage key. Deleting a missing object is not
    /// an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Public URL an object would be served from.
    fn public_url(&self, storage_key: &str) -> String;

    /// Recover the storage key from a public URL produced by this backend,
    /// or `None` when the URL does not belong to it.
    fn key_for_url(&self, url: &str) -> Option<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_converts_to_pipeline_storage() {
        let err: PipelineError = StorageError::DownloadFailed("timed out".to_string()).into();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(err.to_string().contains("timed out"));
    }
}
