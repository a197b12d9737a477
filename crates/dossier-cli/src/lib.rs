use std::path::Path;

use chrono::DateTime;
use dossier_storage::OAuthToken;
use serde::Serialize;

/// What `token-info` prints. The access token itself is never shown in full.
#[derive(Debug, Serialize)]
pub struct TokenSummary {
    pub path: String,
    pub token_type: String,
    pub access_token: String,
    pub has_refresh_token: bool,
    pub scope: Option<String>,
    pub expires_at: Option<String>,
    pub expired: bool,
}

pub fn summarize(path: &Path, token: &OAuthToken) -> TokenSummary {
    TokenSummary {
        path: path.display().to_string(),
        token_type: token.token_type.clone(),
        access_token: redact(&token.access_token, 8),
        has_refresh_token: token.refresh_token.is_some(),
        scope: token.scope.clone(),
        expires_at: token
            .expiry_date
            .and_then(DateTime::from_timestamp_millis)
            .map(|at| at.to_rfc3339()),
        expired: token.is_expired(),
    }
}

/// Keep the first `visible` characters of a secret, appending "..." if anything was cut.
pub fn redact(secret: &str, visible: usize) -> String {
    if secret.chars().count() <= visible {
        return "*".repeat(secret.chars().count());
    }
    let head: String = secret.chars().take(visible).collect();
    format!("{}...", head)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
