//! Document submission: one folder per user, one remote file per document.

use crate::services::FolderResolver;
use dossier_core::UserFolderKey;
use dossier_infra::{CircuitBreaker, CircuitBreakerError};
use dossier_storage::{ContentReader, RemoteEntry, Storage, StorageError, StorageResult};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempPath;

/// One received document, spooled to a temporary file.
#[derive(Debug)]
pub struct SubmissionFile {
    /// Form field the document arrived in.
    pub field: String,
    /// Client-supplied file name; becomes the remote file name.
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// Deleted when the submission finishes, or when dropped.
    pub path: TempPath,
}

/// Documents of one submission keyed by form field.
pub type SubmissionFiles = BTreeMap<String, SubmissionFile>;

#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub folder_id: String,
    pub files: Vec<RemoteEntry>,
}

pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    folders: Arc<FolderResolver>,
    breaker: Arc<CircuitBreaker>,
    parent_folder_id: String,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        folders: Arc<FolderResolver>,
        breaker: Arc<CircuitBreaker>,
        parent_folder_id: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            folders,
            breaker,
            parent_folder_id: parent_folder_id.into(),
        }
    }

    /// Store every document in the user's folder.
    ///
    /// Folder resolution and all uploads run as one call through the upload
    /// breaker. Uploads are issued concurrently and all of them are awaited;
    /// a single failure fails the submission and documents that already
    /// reached the store are left there. A breaker timeout drops the uploads
    /// still in flight, so nothing after that point reaches the store.
    /// Temporary files are removed afterwards whatever the outcome.
    pub async fn submit(
        &self,
        key: &UserFolderKey,
        files: SubmissionFiles,
    ) -> Result<SubmissionReceipt, CircuitBreakerError<StorageError>> {
        let outcome = self.breaker.fire(|| self.store_all(key, &files)).await;

        match &outcome {
            Ok(receipt) => tracing::info!(
                folder = %key,
                folder_id = %receipt.folder_id,
                documents = receipt.files.len(),
                "Submission stored"
            ),
            Err(e) => tracing::error!(
                folder = %key,
                reason = e.reason(),
                error = %e,
                "Submission failed"
            ),
        }

        discard_temp_files(files).await;
        outcome
    }

    async fn store_all(
        &self,
        key: &UserFolderKey,
        files: &SubmissionFiles,
    ) -> StorageResult<SubmissionReceipt> {
        let folder_id = self
            .folders
            .resolve(&self.parent_folder_id, key.as_str())
            .await?;

        let uploads = files.values().map(|file| self.store_one(&folder_id, file));
        let files = join_all(uploads)
            .await
            .into_iter()
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(SubmissionReceipt { folder_id, files })
    }

    async fn store_one(&self, folder_id: &str, file: &SubmissionFile) -> StorageResult<RemoteEntry> {
        let handle = tokio::fs::File::open(&file.path).await?;
        let reader: ContentReader = Box::pin(handle);

        let result = self
            .storage
            .create_file(
                folder_id,
                &file.file_name,
                &file.content_type,
                Some(file.size),
                reader,
            )
            .await;
        if let Err(e) = &result {
            tracing::warn!(field = %file.field, file_name = %file.file_name, error = %e, "Document upload failed");
        }
        result
    }
}

/// Best-effort removal of the spooled documents. Failures are only logged.
async fn discard_temp_files(files: SubmissionFiles) {
    if files.is_empty() {
        return;
    }
    let cleanup = tokio::task::spawn_blocking(move || {
        for (field, file) in files {
            let path = file.path.to_path_buf();
            if let Err(e) = file.path.close() {
                tracing::warn!(field = %field, path = %path.display(), error = %e, "Failed to remove temporary file");
            }
        }
    });
    if let Err(e) = cleanup.await {
        tracing::warn!(error = %e, "Temporary file cleanup task failed");
    }
}
