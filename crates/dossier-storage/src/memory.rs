use crate::traits::{ContentReader, RemoteEntry, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Mutex, MutexGuard};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// One stored folder or file.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub is_folder: bool,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub trashed: bool,
}

/// In-process storage keeping entries in insertion order.
///
/// Used for development runs without Drive credentials and as the store
/// behind service and HTTP tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Vec<MemoryEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MemoryEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of every entry, trashed ones included.
    pub fn snapshot(&self) -> Vec<MemoryEntry> {
        self.lock().clone()
    }

    /// Non-trashed folders named `name` anywhere in the store.
    pub fn folders_named(&self, name: &str) -> Vec<MemoryEntry> {
        self.lock()
            .iter()
            .filter(|e| e.is_folder && !e.trashed && e.name == name)
            .cloned()
            .collect()
    }

    /// Marks an entry as trashed. Returns false when the id is unknown.
    pub fn trash(&self, id: &str) -> bool {
        match self.lock().iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.trashed = true;
                true
            }
            None => false,
        }
    }

    fn insert(&self, entry: MemoryEntry) -> RemoteEntry {
        let remote = RemoteEntry {
            id: entry.id.clone(),
            name: entry.name.clone(),
        };
        self.lock().push(entry);
        remote
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn find_folders(&self, parent_id: &str, name: &str) -> StorageResult<Vec<RemoteEntry>> {
        Ok(self
            .lock()
            .iter()
            .filter(|e| e.is_folder && !e.trashed && e.parent_id == parent_id && e.name == name)
            .map(|e| RemoteEntry {
                id: e.id.clone(),
                name: e.name.clone(),
            })
            .collect())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<RemoteEntry> {
        if name.is_empty() {
            return Err(StorageError::CreateFolderFailed(
                "Folder name must not be empty".to_string(),
            ));
        }
        Ok(self.insert(MemoryEntry {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
            is_folder: true,
            content_type: None,
            data: Bytes::new(),
            trashed: false,
        }))
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content_type: &str,
        _content_length: Option<u64>,
        mut reader: ContentReader,
    ) -> StorageResult<RemoteEntry> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read content: {}", e)))?;

        Ok(self.insert(MemoryEntry {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
            is_folder: false,
            content_type: Some(content_type.to_string()),
            data: Bytes::from(data),
            trashed: false,
        }))
    }

    async fn list_children(&self, folder_id: &str) -> StorageResult<Vec<RemoteEntry>> {
        Ok(self
            .lock()
            .iter()
            .filter(|e| !e.trashed && e.parent_id == folder_id)
            .map(|e| RemoteEntry {
                id: e.id.clone(),
                name: e.name.clone(),
            })
            .collect())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
