//! Find-or-create of per-user submission folders.

use dossier_storage::{Storage, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Resolves a folder name under a parent to exactly one folder id.
///
/// The remote store has no uniqueness constraint on names, so resolving is a
/// search followed by a create. Resolutions of the same `(parent, name)` pair
/// are serialized inside this process; a second caller waits and then finds
/// the folder the first one created. Separate processes sharing a parent can
/// still race and produce duplicates, in which case the first folder in store
/// order wins on every later lookup.
pub struct FolderResolver {
    storage: Arc<dyn Storage>,
    locks: Mutex<HashMap<(String, String), KeyLock>>,
}

/// Holds the per-key lock; the map entry is dropped with the last holder.
struct KeyLease<'a> {
    resolver: &'a FolderResolver,
    key: (String, String),
    lock: KeyLock,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.resolver.locks();
        // one reference in the map, one here: nobody else is waiting
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

impl FolderResolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<(String, String), KeyLock>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn lease(&self, parent_id: &str, folder_name: &str) -> KeyLease<'_> {
        let key = (parent_id.to_string(), folder_name.to_string());
        let lock = self.locks().entry(key.clone()).or_default().clone();
        let guard = lock.clone().lock_owned().await;
        KeyLease {
            resolver: self,
            key,
            lock,
            guard: Some(guard),
        }
    }

    /// Id of the first non-trashed folder named `folder_name` under
    /// `parent_id`, in store order. Never creates anything.
    pub async fn find(&self, parent_id: &str, folder_name: &str) -> StorageResult<Option<String>> {
        let folders = self.storage.find_folders(parent_id, folder_name).await?;
        if folders.len() > 1 {
            tracing::warn!(
                folder_name = %folder_name,
                matches = folders.len(),
                "Duplicate submission folders; using the first"
            );
        }
        Ok(folders.into_iter().next().map(|folder| folder.id))
    }

    /// Id of the folder named `folder_name` under `parent_id`, creating it
    /// when none exists.
    pub async fn resolve(&self, parent_id: &str, folder_name: &str) -> StorageResult<String> {
        let _lease = self.lease(parent_id, folder_name).await;

        if let Some(folder_id) = self.find(parent_id, folder_name).await? {
            tracing::debug!(folder_name = %folder_name, folder_id = %folder_id, "Folder found");
            return Ok(folder_id);
        }

        let folder = self.storage.create_folder(parent_id, folder_name).await?;
        tracing::info!(folder_name = %folder_name, folder_id = %folder.id, "Folder created");
        Ok(folder.id)
    }

    #[cfg(test)]
    fn pending_keys(&self) -> usize {
        self.locks().len()
    }
}
