//! Storage backend setup

use anyhow::{Context, Result};
use dossier_core::Config;
use dossier_infra::{AuthBootstrap, CircuitBreakers, OperationCategory};
use dossier_storage::{create_storage, Storage, StorageBackend, TokenStore};
use std::sync::Arc;

/// Build the configured backend. Drive needs a provisioned token record; the
/// server never prompts for one.
pub async fn setup_storage(
    config: &Config,
    breakers: &CircuitBreakers,
) -> Result<Arc<dyn Storage>> {
    let token = match config.storage_backend() {
        StorageBackend::Drive => {
            let bootstrap = AuthBootstrap::new(
                TokenStore::new(&config.drive().token_path),
                breakers.get(OperationCategory::Bootstrap).clone(),
            );
            let token = bootstrap
                .require_cached()
                .await
                .context("Google Drive credentials are not available")?;
            Some(token)
        }
        StorageBackend::Local | StorageBackend::Memory => None,
    };

    let storage = create_storage(config, token)
        .await
        .context("Failed to initialize storage backend")?;

    tracing::info!(
        backend = %storage.backend_type(),
        parent_folder_id = %config.parent_folder_id(),
        "Storage initialized"
    );
    if storage.backend_type() == StorageBackend::Memory {
        tracing::warn!("Using in-memory storage; submissions are lost on restart");
    }

    Ok(storage)
}

/// Create the directory multipart bodies are spooled into.
pub async fn prepare_upload_dir(config: &Config) -> Result<()> {
    tokio::fs::create_dir_all(config.upload_dir())
        .await
        .with_context(|| {
            format!(
                "Failed to create upload directory {}",
                config.upload_dir().display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::BreakerPolicy;

    fn config(vars: Vec<(&'static str, String)>) -> Config {
        Config::from_lookup(move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn drive_without_token_record_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(vec![(
            "GOOGLE_TOKEN_PATH",
            dir.path().join("token.json").display().to_string(),
        )]);

        let err = setup_storage(&config, &CircuitBreakers::new(BreakerPolicy::default()))
            .await
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("dossier authorize"));
    }

    #[tokio::test]
    async fn memory_backend_needs_no_credentials() {
        let config = config(vec![("STORAGE_BACKEND", "memory".to_string())]);
        let storage = setup_storage(&config, &CircuitBreakers::new(BreakerPolicy::default()))
            .await
            .unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn upload_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("spool").join("uploads");
        let config = config(vec![("UPLOAD_DIR", target.display().to_string())]);

        prepare_upload_dir(&config).await.unwrap();
        assert!(target.is_dir());
    }
}
