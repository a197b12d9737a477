use async_trait::async_trait;
use dossier_storage::{
    ContentReader, MemoryStorage, RemoteEntry, Storage, StorageBackend, StorageError,
    StorageResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Memory store that can be told to fail, counting folder creations.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    folders_created: AtomicUsize,
    uploads_attempted: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_searches: AtomicBool,
    upload_parents: Mutex<Vec<String>>,
}

impl FlakyStorage {
    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    pub fn folders_created(&self) -> usize {
        self.folders_created.load(Ordering::SeqCst)
    }

    pub fn uploads_attempted(&self) -> usize {
        self.uploads_attempted.load(Ordering::SeqCst)
    }

    /// Parent id of every `create_file` call, in call order.
    pub fn upload_parents(&self) -> Vec<String> {
        self.upload_parents.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    /// Names of the non-trashed files stored under `folder_id`, in store order.
    pub fn file_names_in(&self, folder_id: &str) -> Vec<String> {
        self.inner
            .snapshot()
            .into_iter()
            .filter(|e| !e.is_folder && !e.trashed && e.parent_id == folder_id)
            .map(|e| e.name)
            .collect()
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn find_folders(&self, parent_id: &str, name: &str) -> StorageResult<Vec<RemoteEntry>> {
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("search backend down".to_string()));
        }
        self.inner.find_folders(parent_id, name).await
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<RemoteEntry> {
        self.folders_created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_folder(parent_id, name).await
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ContentReader,
    ) -> StorageResult<RemoteEntry> {
        self.uploads_attempted.fetch_add(1, Ordering::SeqCst);
        self.upload_parents
            .lock()
            .unwrap()
            .push(parent_id.to_string());
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("storage quota exceeded".to_string()));
        }
        self.inner
            .create_file(parent_id, name, content_type, content_length, reader)
            .await
    }

    async fn list_children(&self, folder_id: &str) -> StorageResult<Vec<RemoteEntry>> {
        self.inner.list_children(folder_id).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
