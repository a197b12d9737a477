//! Google Drive v3 storage backend.

mod auth;
pub mod query;

pub use auth::{ClientSecret, ClientSecrets, GoogleOAuthClient, OAuthToken, TokenStore};

use crate::traits::{ContentReader, RemoteEntry, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use dossier_core::constants::FOLDER_MIME_TYPE;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;

const PAGE_SIZE: &str = "1000";

/// Base URLs of the Drive v3 `files` resource.
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    /// Metadata endpoint, used by `files.list` and folder creation.
    pub files: String,
    /// Media endpoint that opens resumable upload sessions.
    pub upload: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteEntry>,
    next_page_token: Option<String>,
}

/// Drive-backed storage.
///
/// The token record handed in at construction is never written back; refreshed
/// access tokens live only in this instance.
pub struct DriveStorage {
    http: reqwest::Client,
    oauth: GoogleOAuthClient,
    token: RwLock<OAuthToken>,
    endpoints: DriveEndpoints,
}

impl DriveStorage {
    pub fn new(
        http: reqwest::Client,
        oauth: GoogleOAuthClient,
        token: OAuthToken,
        endpoints: DriveEndpoints,
    ) -> Self {
        Self {
            http,
            oauth,
            token: RwLock::new(token),
            endpoints,
        }
    }

    async fn access_token(&self) -> StorageResult<String> {
        {
            let token = self.token.read().await;
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        // another task may have refreshed while we waited for the write lock
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }
        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            StorageError::AuthError(
                "Access token expired and no refresh token is available".to_string(),
            )
        })?;

        let refreshed = self.oauth.refresh(&refresh_token).await?;
        tracing::debug!(expiry_date = ?refreshed.expiry_date, "Drive access token refreshed");
        *token = refreshed;
        Ok(token.access_token.clone())
    }

    async fn check(response: reqwest::Response, context: &str) -> StorageResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(StorageError::BackendError(format!(
            "{} failed with Drive API status {}: {}",
            context, status, body
        )))
    }

    /// Runs a `files.list` query across every result page, keeping Drive's order.
    async fn list_all(&self, query: &str, context: &str) -> StorageResult<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let access_token = self.access_token().await?;
            let mut params = vec![
                ("q", query.to_string()),
                ("fields", "nextPageToken, files(id, name)".to_string()),
                ("spaces", "drive".to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }

            let response = self
                .http
                .get(&self.endpoints.files)
                .bearer_auth(access_token)
                .query(&params)
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(format!("{}: {}", context, e)))?;

            let page: FileList = Self::check(response, context)
                .await?
                .json()
                .await
                .map_err(|e| StorageError::ListFailed(format!("{}: {}", context, e)))?;

            entries.extend(page.files);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl Storage for DriveStorage {
    async fn find_folders(&self, parent_id: &str, name: &str) -> StorageResult<Vec<RemoteEntry>> {
        let start = std::time::Instant::now();
        let folders = self
            .list_all(&query::folder_by_name(parent_id, name), "Folder search")
            .await?;

        tracing::debug!(
            folder_name = %name,
            matches = folders.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Drive folder search completed"
        );

        Ok(folders)
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<RemoteEntry> {
        let access_token = self.access_token().await?;
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });

        let response = self
            .http
            .post(&self.endpoints.files)
            .bearer_auth(access_token)
            .query(&[("fields", "id, name")])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| StorageError::CreateFolderFailed(e.to_string()))?;

        let folder: RemoteEntry = Self::check(response, "Folder creation")
            .await?
            .json()
            .await
            .map_err(|e| StorageError::CreateFolderFailed(e.to_string()))?;

        tracing::info!(folder_id = %folder.id, folder_name = %name, "Drive folder created");
        Ok(folder)
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ContentReader,
    ) -> StorageResult<RemoteEntry> {
        let start = std::time::Instant::now();
        let access_token = self.access_token().await?;
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
        });

        // Resumable session: metadata first, then the content is streamed to the session URI.
        let mut session = self
            .http
            .post(&self.endpoints.upload)
            .bearer_auth(&access_token)
            .query(&[("uploadType", "resumable"), ("fields", "id, name")])
            .header("X-Upload-Content-Type", content_type)
            .json(&metadata);
        if let Some(len) = content_length {
            session = session.header("X-Upload-Content-Length", len.to_string());
        }
        let response = session
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Upload session for {}: {}", name, e)))?;
        let response = Self::check(response, "Upload session").await?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                StorageError::UploadFailed("Drive returned no upload session URI".to_string())
            })?;

        let mut upload = self
            .http
            .put(&location)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(reader)));
        if let Some(len) = content_length {
            upload = upload.header(reqwest::header::CONTENT_LENGTH, len);
        }
        let response = upload
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Upload of {}: {}", name, e)))?;

        let file: RemoteEntry = Self::check(response, "File upload")
            .await?
            .json()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(
            file_id = %file.id,
            file_name = %name,
            size_bytes = ?content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Drive upload successful"
        );

        Ok(file)
    }

    async fn list_children(&self, folder_id: &str) -> StorageResult<Vec<RemoteEntry>> {
        self.list_all(&query::children_of(folder_id), "Folder listing")
            .await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Drive
    }
}
