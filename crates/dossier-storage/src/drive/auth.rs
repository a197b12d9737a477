//! Google OAuth2 installed-application credentials.
//!
//! Client secrets come from the JSON file downloaded from the Google Cloud
//! console. The token record uses the same field names as other Google client
//! libraries, so an existing `token.json` keeps working.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::traits::{StorageError, StorageResult};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_MS: i64 = 60_000;

/// One client entry of the secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Secrets file: either an `installed` or a `web` client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> StorageResult<ClientSecret> {
        let secrets: ClientSecrets = serde_json::from_str(raw).map_err(|e| {
            StorageError::ConfigError(format!("Invalid OAuth client secrets: {}", e))
        })?;
        secrets.installed.or(secrets.web).ok_or_else(|| {
            StorageError::ConfigError(
                "OAuth client secrets contain neither an 'installed' nor a 'web' client"
                    .to_string(),
            )
        })
    }

    pub async fn load(path: &Path) -> StorageResult<ClientSecret> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to read OAuth client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }
}

/// Persisted credentials record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expiry as epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// True when the access token is expired or about to be. Tokens without
    /// a recorded expiry are treated as valid.
    pub fn is_expired(&self) -> bool {
        self.expiry_date
            .map(|expiry| Utc::now().timestamp_millis() + EXPIRY_SKEW_MS >= expiry)
            .unwrap_or(false)
    }
}

/// Token endpoint reply.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            scope: self.scope,
            token_type: self.token_type.unwrap_or_else(default_token_type),
            expiry_date: self
                .expires_in
                .map(|secs| Utc::now().timestamp_millis() + secs * 1000),
        }
    }
}

/// File-backed token record.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no record has been written yet.
    pub async fn load(&self) -> StorageResult<Option<OAuthToken>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            StorageError::ConfigError(format!(
                "Invalid token record {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub async fn save(&self, token: &OAuthToken) -> StorageResult<()> {
        let raw = serde_json::to_vec_pretty(token)
            .map_err(|e| StorageError::ConfigError(format!("Failed to encode token: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, raw).await?;
        tracing::info!(path = %self.path.display(), "Token stored");
        Ok(())
    }
}

/// OAuth2 client for the installed-application flow.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    secret: ClientSecret,
}

impl GoogleOAuthClient {
    pub fn new(http: reqwest::Client, secret: ClientSecret) -> Self {
        Self { http, secret }
    }

    fn redirect_uri(&self) -> &str {
        self.secret
            .redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("urn:ietf:wg:oauth:2.0:oob")
    }

    /// Consent URL asking for offline access, so a refresh token is issued.
    pub fn authorization_url(&self, scopes: &[&str]) -> String {
        format!(
            "{}?access_type=offline&response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.secret.auth_uri,
            urlencoding::encode(&self.secret.client_id),
            urlencoding::encode(self.redirect_uri()),
            urlencoding::encode(&scopes.join(" ")),
        )
    }

    /// Exchange a one-time authorization code for a token record.
    pub async fn exchange_code(&self, code: &str) -> StorageResult<OAuthToken> {
        let params = [
            ("code", code.trim()),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.post_token(&params).await?;
        Ok(response.into_token(None))
    }

    /// Obtain a fresh access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> StorageResult<OAuthToken> {
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.post_token(&params).await?;
        Ok(response.into_token(Some(refresh_token.to_string())))
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> StorageResult<TokenResponse> {
        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| StorageError::AuthError(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::AuthError(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| StorageError::AuthError(format!("Invalid token response: {}", e)))
    }
}
