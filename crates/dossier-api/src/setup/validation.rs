//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use dossier_core::Config;

/// Validate critical configuration values
///
/// Fails fast on settings that would make the gateway insecure or unable to
/// serve; only warns about the ones it can run with.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.keycloak().issuer.is_none() {
        tracing::warn!("KEYCLOAK_ISSUER not set - token issuer will not be checked");
    }
    if config.keycloak().audience.is_none() && config.is_production() {
        tracing::warn!("KEYCLOAK_AUDIENCE not set - tokens for any client will be accepted");
    }

    let policy = config.breaker_policy();
    if policy.timeout > policy.reset_timeout {
        tracing::warn!(
            timeout_ms = policy.timeout.as_millis() as u64,
            reset_timeout_ms = policy.reset_timeout.as_millis() as u64,
            "Breaker timeout exceeds reset timeout"
        );
    }

    tracing::info!(
        environment = %config.environment(),
        storage_backend = %config.storage_backend(),
        "Configuration validated"
    );
    Ok(())
}
