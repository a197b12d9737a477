use crate::services::FolderResolver;
use dossier_core::{SubmissionStatus, UserFolderKey};
use dossier_infra::{CircuitBreaker, CircuitBreakerError};
use dossier_storage::{Storage, StorageError};
use std::sync::Arc;

/// Reports what a user has submitted so far. Never creates folders.
pub struct StatusReporter {
    storage: Arc<dyn Storage>,
    folders: Arc<FolderResolver>,
    breaker: Arc<CircuitBreaker>,
    parent_folder_id: String,
}

impl StatusReporter {
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

    /// Names of the files in the user's folder, in store order.
    pub async fn status(
        &self,
        key: &UserFolderKey,
    ) -> Result<SubmissionStatus, CircuitBreakerError<StorageError>> {
        self.breaker
            .fire(|| async {
                let Some(folder_id) = self
                    .folders
                    .find(&self.parent_folder_id, key.as_str())
                    .await?
                else {
                    return Ok(SubmissionStatus::not_found());
                };

                let files = self
                    .storage
                    .list_children(&folder_id)
                    .await?
                    .into_iter()
                    .map(|entry| entry.name)
                    .collect();
                Ok::<_, StorageError>(SubmissionStatus { found: true, files })
            })
            .await
    }
}
