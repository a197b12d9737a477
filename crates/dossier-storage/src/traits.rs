//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Listing failed: {0}")]
    ListFailed(String),

    #[error("Folder creation failed: {0}")]
    CreateFolderFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Authorization error: {0}")]
    AuthError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte source handed to [`Storage::create_file`]; consumed until EOF.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send + Sync + Unpin>>;

/// A folder or file as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
}

/// Storage abstraction trait
///
/// Backends only ever report non-trashed entries, in their own natural order.
/// None of the operations retry; every failure is returned to the caller.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Folders named exactly `name` directly under `parent_id`.
    async fn find_folders(&self, parent_id: &str, name: &str) -> StorageResult<Vec<RemoteEntry>>;

    /// Create a folder named `name` under `parent_id`.
    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<RemoteEntry>;

    /// Create a file under `parent_id` from a stream.
    ///
    /// # Arguments
    /// * `parent_id` - Folder that will contain the file
    /// * `name` - File name shown in the folder
    /// * `content_type` - MIME type of the content
    /// * `content_length` - Expected size, when known
    /// * `reader` - Content, read until EOF
    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ContentReader,
    ) -> StorageResult<RemoteEntry>;

    /// Immediate children of `folder_id`, all pages.
    async fn list_children(&self, folder_id: &str) -> StorageResult<Vec<RemoteEntry>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
