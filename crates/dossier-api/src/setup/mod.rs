//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::auth::KeycloakVerifier;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use dossier_core::Config;
use dossier_infra::telemetry::{init_telemetry, LogFormat};
use dossier_infra::CircuitBreakers;
use std::sync::Arc;

/// Initialize the application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router)> {
    init_telemetry("dossier-api", config.environment(), LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    validation::validate_config(&config)?;

    tracing::info!(
        port = config.server_port(),
        environment = %config.environment(),
        "Starting Dossier API"
    );

    let breakers = CircuitBreakers::new(config.breaker_policy());
    let storage = storage::setup_storage(&config, &breakers).await?;
    storage::prepare_upload_dir(&config).await?;

    let http = dossier_storage::factory::http_client()
        .context("Failed to create HTTP client for Keycloak")?;
    let verifier = KeycloakVerifier::new(http, config.keycloak())?;

    let state = Arc::new(AppState::new(
        config.clone(),
        storage,
        breakers,
        Arc::new(verifier),
    ));
    let app = routes::setup_routes(&config, state.clone()).await?;

    Ok((state, app))
}
