//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers can extract only what they
//! need via Axum's `FromRef`.

use crate::auth::TokenVerifier;
use crate::services::{FolderResolver, StatusReporter, UploadOrchestrator};
use dossier_core::Config;
use dossier_infra::{CircuitBreakers, OperationCategory};
use dossier_storage::{Storage, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the submission endpoints need.
#[derive(Clone)]
pub struct SubmissionState {
    pub uploads: Arc<UploadOrchestrator>,
    pub status: Arc<StatusReporter>,
    /// Directory multipart bodies are spooled into.
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
}

/// Backend identity and breaker registry, for health reporting.
#[derive(Clone)]
pub struct HealthState {
    pub backend: StorageBackend,
    pub breakers: CircuitBreakers,
}

pub struct AppState {
    pub submissions: SubmissionState,
    pub health: HealthState,
    pub verifier: Arc<dyn TokenVerifier>,
    pub config: Config,
}

impl AppState {
    /// Wires the services around one storage backend. `breakers` are shared
    /// with whatever ran before the server (credential bootstrap).
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        breakers: CircuitBreakers,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let folders = Arc::new(FolderResolver::new(storage.clone()));
        let parent_folder_id = config.parent_folder_id().to_string();

        let uploads = UploadOrchestrator::new(
            storage.clone(),
            folders.clone(),
            breakers.get(OperationCategory::Upload).clone(),
            parent_folder_id.clone(),
        );
        let status = StatusReporter::new(
            storage.clone(),
            folders,
            breakers.get(OperationCategory::Status).clone(),
            parent_folder_id,
        );

        Self {
            submissions: SubmissionState {
                uploads: Arc::new(uploads),
                status: Arc::new(status),
                upload_dir: config.upload_dir().to_path_buf(),
                max_file_size: config.max_file_size_bytes(),
            },
            health: HealthState {
                backend: storage.backend_type(),
                breakers,
            },
            verifier,
            config,
        }
    }
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for SubmissionState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.submissions.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for HealthState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.health.clone()
    }
}
