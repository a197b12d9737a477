//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p dossier-api`. Storage is the
//! in-memory backend and tokens are checked by a static verifier, so no
//! network access is needed.

pub mod auth;
pub mod storage;

use axum_test::TestServer;
use dossier_api::setup::routes;
use dossier_api::state::AppState;
use dossier_core::{BreakerPolicy, Config};
use dossier_infra::CircuitBreakers;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use self::storage::FlakyStorage;

pub const PARENT_FOLDER_ID: &str = "parent-under-test";

/// Test application: server, backing store and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<FlakyStorage>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Names of the files left in the spool directory.
    pub fn spooled_files(&self) -> Vec<String> {
        spooled_files(self.upload_dir.path())
    }
}

fn spooled_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("Failed to read upload dir")
        .map(|entry| {
            entry
                .expect("Failed to read dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn create_test_config(upload_dir: &Path, max_file_size_mb: usize) -> Config {
    let vars = vec![
        ("STORAGE_BACKEND", "memory".to_string()),
        ("DRIVE_PARENT_FOLDER_ID", PARENT_FOLDER_ID.to_string()),
        ("KEYCLOAK_ISSUER", auth::TEST_ISSUER.to_string()),
        ("UPLOAD_DIR", upload_dir.display().to_string()),
        ("MAX_FILE_SIZE_MB", max_file_size_mb.to_string()),
        ("ENVIRONMENT", "test".to_string()),
    ];
    Config::from_lookup(move |key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("Failed to build test config")
}

/// Setup test app with the default breaker policy.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(BreakerPolicy::default(), 10).await
}

/// Setup test app with a custom breaker policy and per-file size limit.
pub async fn setup_test_app_with(policy: BreakerPolicy, max_file_size_mb: usize) -> TestApp {
    let upload_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(upload_dir.path(), max_file_size_mb);

    let storage = Arc::new(FlakyStorage::default());
    let breakers = CircuitBreakers::new(policy);
    let state = Arc::new(AppState::new(
        config.clone(),
        storage.clone(),
        breakers,
        Arc::new(auth::StaticVerifier::default()),
    ));

    let app = routes::setup_routes(&config, state)
        .await
        .expect("Failed to setup routes");
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        upload_dir,
    }
}

/// Policy whose breaker trips on the first failure and stays open for the
/// rest of the test.
pub fn tripping_policy() -> BreakerPolicy {
    BreakerPolicy {
        error_threshold_percentage: 1,
        volume_threshold: 1,
        reset_timeout: Duration::from_secs(600),
        ..BreakerPolicy::default()
    }
}
