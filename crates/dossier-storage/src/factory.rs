use crate::{
    ClientSecrets, DriveEndpoints, DriveStorage, GoogleOAuthClient, LocalStorage, MemoryStorage,
    OAuthToken, Storage, StorageBackend, StorageError, StorageResult,
};
use dossier_core::Config;
use std::sync::Arc;
use std::time::Duration;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Timeout for a single HTTP exchange with Google; guarded calls also carry
/// the shorter breaker deadline.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub fn http_client() -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Create a storage backend based on configuration
///
/// The drive backend needs the token record produced by provisioning; the
/// other backends ignore `token`.
pub async fn create_storage(
    config: &Config,
    token: Option<OAuthToken>,
) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        StorageBackend::Drive => {
            let token = token.ok_or_else(|| {
                StorageError::ConfigError(
                    "No Google Drive credentials found. Run `dossier authorize` first.".to_string(),
                )
            })?;
            let secret = ClientSecrets::load(&config.drive().credentials_path).await?;
            let http = http_client()?;
            let oauth = GoogleOAuthClient::new(http.clone(), secret);
            let endpoints = DriveEndpoints {
                files: DRIVE_FILES_URL.to_string(),
                upload: DRIVE_UPLOAD_URL.to_string(),
            };
            Ok(Arc::new(DriveStorage::new(http, oauth, token, endpoints)))
        }
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path()).await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
