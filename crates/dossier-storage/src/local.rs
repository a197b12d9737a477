use crate::traits::{ContentReader, RemoteEntry, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Folders are directories and ids are paths relative to the base directory,
/// so the configured parent folder id becomes a top-level directory.
/// Creating a file whose name already exists in the folder replaces it.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path` (created if missing).
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert an id to a filesystem path, rejecting anything that could
    /// escape the base directory.
    fn id_to_path(&self, id: &str) -> StorageResult<PathBuf> {
        if id.is_empty()
            || id.starts_with('/')
            || id.contains('\\')
            || id.split('/').any(|part| part.is_empty() || part == ".." || part == ".")
        {
            return Err(StorageError::InvalidId(format!(
                "'{}' is not a valid local storage id",
                id
            )));
        }
        Ok(self.base_path.join(id))
    }

    fn child_id(parent_id: &str, name: &str) -> StorageResult<String> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." || name == "." {
            return Err(StorageError::InvalidId(format!(
                "'{}' is not a valid entry name",
                name
            )));
        }
        Ok(format!("{}/{}", parent_id, name))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn find_folders(&self, parent_id: &str, name: &str) -> StorageResult<Vec<RemoteEntry>> {
        let id = Self::child_id(parent_id, name)?;
        let path = self.id_to_path(&id)?;

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(vec![RemoteEntry {
                id,
                name: name.to_string(),
            }]),
            Ok(_) => Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::ListFailed(format!(
                "Failed to inspect {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<RemoteEntry> {
        let id = Self::child_id(parent_id, name)?;
        let path = self.id_to_path(&id)?;

        fs::create_dir_all(&path).await.map_err(|e| {
            StorageError::CreateFolderFailed(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), "Local folder created");

        Ok(RemoteEntry {
            id,
            name: name.to_string(),
        })
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        _content_type: &str,
        _content_length: Option<u64>,
        mut reader: ContentReader,
    ) -> StorageResult<RemoteEntry> {
        let id = Self::child_id(parent_id, name)?;
        let path = self.id_to_path(&id)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(self.id_to_path(parent_id)?).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("folder {}", parent_id)));
        }

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                path.display(),
                e
            ))
        })?;

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(RemoteEntry {
            id,
            name: name.to_string(),
        })
    }

    async fn list_children(&self, folder_id: &str) -> StorageResult<Vec<RemoteEntry>> {
        let path = self.id_to_path(folder_id)?;

        let mut dir = match fs::read_dir(&path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("folder {}", folder_id)))
            }
            Err(e) => {
                return Err(StorageError::ListFailed(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut children = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            children.push(RemoteEntry {
                id: format!("{}/{}", folder_id, name),
                name,
            });
        }
        // read_dir order is platform dependent; name order is this backend's natural order
        children.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(children)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn reader(data: &'static [u8]) -> ContentReader {
        Box::pin(std::io::Cursor::new(data))
    }

    #[tokio::test]
    async fn test_find_or_create_folder_on_disk() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(storage
            .find_folders("parent", "Ruiz_Ana_aruiz")
            .await
            .unwrap()
            .is_empty());

        let created = storage.create_folder("parent", "Ruiz_Ana_aruiz").await.unwrap();
        assert_eq!(created.id, "parent/Ruiz_Ana_aruiz");
        assert!(dir.path().join("parent/Ruiz_Ana_aruiz").is_dir());

        let found = storage.find_folders("parent", "Ruiz_Ana_aruiz").await.unwrap();
        assert_eq!(found, vec![created]);
    }

    #[tokio::test]
    async fn test_create_file_and_list_children() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let folder = storage.create_folder("parent", "Ruiz_Ana_aruiz").await.unwrap();

        storage
            .create_file(&folder.id, "seguro.pdf", "application/pdf", None, reader(b"B"))
            .await
            .unwrap();
        storage
            .create_file(&folder.id, "cedula.pdf", "application/pdf", None, reader(b"A"))
            .await
            .unwrap();

        let names: Vec<String> = storage
            .list_children(&folder.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["cedula.pdf", "seguro.pdf"]);
        assert_eq!(
            std::fs::read(dir.path().join("parent/Ruiz_Ana_aruiz/seguro.pdf")).unwrap(),
            b"B"
        );
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.list_children("../../etc").await;
        assert!(matches!(result, Err(StorageError::InvalidId(_))));

        let result = storage.create_folder("parent", "..").await;
        assert!(matches!(result, Err(StorageError::InvalidId(_))));

        let result = storage.find_folders("/etc", "passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_create_file_in_missing_folder() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage
            .create_file("parent/nobody", "a.pdf", "application/pdf", None, reader(b"A"))
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
