//! Configuration module
//!
//! Environment-driven settings for the HTTP server, the remote storage
//! backend, identity verification and the circuit breakers.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::DEFAULT_PARENT_FOLDER_ID;
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MAX_FILE_SIZE_MB: usize = 10;
const BREAKER_TIMEOUT_MS: u64 = 5_000;
const BREAKER_ERROR_THRESHOLD_PERCENTAGE: u8 = 50;
const BREAKER_RESET_TIMEOUT_MS: u64 = 30_000;
const BREAKER_ROLLING_WINDOW_MS: u64 = 10_000;
const BREAKER_ROLLING_BUCKETS: u32 = 10;
const JWKS_CACHE_TTL_SECS: u64 = 3_600;
const MAX_FILE_SIZE_MB_LIMIT: usize = 1_024;
const JWKS_CACHE_TTL_SECS_LIMIT: u64 = 7 * 24 * 3_600;

/// Credentials file location used by the hosted deployment (secret files are
/// mounted there when the `RENDER` variable is present).
const HOSTED_CREDENTIALS_PATH: &str = "/etc/secrets/oauth_credentials.json";
const LOCAL_CREDENTIALS_PATH: &str = "oauth_credentials.json";

/// Server settings shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Circuit breaker policy applied to each guarded operation category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Deadline for a single guarded call.
    pub timeout: Duration,
    /// Failure share (0-100) of the rolling window that opens the circuit.
    pub error_threshold_percentage: u8,
    /// Time spent open before one trial is let through.
    pub reset_timeout: Duration,
    /// Length of the statistics window.
    pub rolling_window: Duration,
    /// Number of buckets the window is split into.
    pub rolling_buckets: u32,
    /// Minimum calls in the window before the circuit may open.
    pub volume_threshold: u32,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(BREAKER_TIMEOUT_MS),
            error_threshold_percentage: BREAKER_ERROR_THRESHOLD_PERCENTAGE,
            reset_timeout: Duration::from_millis(BREAKER_RESET_TIMEOUT_MS),
            rolling_window: Duration::from_millis(BREAKER_ROLLING_WINDOW_MS),
            rolling_buckets: BREAKER_ROLLING_BUCKETS,
            volume_threshold: 0,
        }
    }
}

impl BreakerPolicy {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.timeout.is_zero() {
            return Err(anyhow::anyhow!("BREAKER_TIMEOUT_MS must be greater than 0"));
        }
        if self.error_threshold_percentage == 0 || self.error_threshold_percentage > 100 {
            return Err(anyhow::anyhow!(
                "BREAKER_ERROR_THRESHOLD_PERCENTAGE must be between 1 and 100"
            ));
        }
        if self.rolling_buckets == 0 {
            return Err(anyhow::anyhow!(
                "BREAKER_ROLLING_BUCKETS must be greater than 0"
            ));
        }
        if self.rolling_window < Duration::from_millis(u64::from(self.rolling_buckets)) {
            return Err(anyhow::anyhow!(
                "BREAKER_ROLLING_WINDOW_MS must be at least one millisecond per bucket"
            ));
        }
        Ok(())
    }
}

/// Google Drive settings
#[derive(Clone, Debug)]
pub struct DriveConfig {
    pub parent_folder_id: String,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

/// Keycloak realm used to verify bearer tokens
#[derive(Clone, Debug)]
pub struct KeycloakConfig {
    pub issuer: Option<String>,
    pub jwks_url: Option<String>,
    pub audience: Option<String>,
    pub jwks_cache_ttl_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base: BaseConfig,
    pub storage_backend: StorageBackend,
    pub drive: DriveConfig,
    pub local_storage_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_file_size_bytes: usize,
    pub keycloak: KeycloakConfig,
    pub breaker: BreakerPolicy,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<GatewayConfig>);

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        GatewayConfig::from_lookup(lookup).map(|config| Config(Box::new(config)))
    }

    fn inner(&self) -> &GatewayConfig {
        &self.0
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn drive(&self) -> &DriveConfig {
        &self.inner().drive
    }

    pub fn parent_folder_id(&self) -> &str {
        &self.inner().drive.parent_folder_id
    }

    pub fn local_storage_path(&self) -> &std::path::Path {
        &self.inner().local_storage_path
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        &self.inner().upload_dir
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn keycloak(&self) -> &KeycloakConfig {
        &self.inner().keycloak
    }

    pub fn breaker_policy(&self) -> BreakerPolicy {
        self.inner().breaker
    }
}

impl GatewayConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = parse_or(&lookup, "PORT", SERVER_PORT)?;

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Drive,
        };

        let credentials_path = lookup("GOOGLE_OAUTH_CREDENTIALS_PATH").unwrap_or_else(|| {
            if lookup("RENDER").is_some() {
                HOSTED_CREDENTIALS_PATH.to_string()
            } else {
                LOCAL_CREDENTIALS_PATH.to_string()
            }
        });

        let drive = DriveConfig {
            parent_folder_id: lookup("DRIVE_PARENT_FOLDER_ID")
                .unwrap_or_else(|| DEFAULT_PARENT_FOLDER_ID.to_string()),
            credentials_path: PathBuf::from(credentials_path),
            token_path: PathBuf::from(
                lookup("GOOGLE_TOKEN_PATH").unwrap_or_else(|| "token.json".to_string()),
            ),
        };

        let max_file_size_mb = parse_or(&lookup, "MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB)?;
        if max_file_size_mb > MAX_FILE_SIZE_MB_LIMIT {
            return Err(anyhow::anyhow!(
                "MAX_FILE_SIZE_MB must be at most {}",
                MAX_FILE_SIZE_MB_LIMIT
            ));
        }
        let max_file_size_bytes = max_file_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("MAX_FILE_SIZE_MB is too large"))?;

        let jwks_cache_ttl_seconds =
            parse_or(&lookup, "KEYCLOAK_JWKS_CACHE_TTL_SECS", JWKS_CACHE_TTL_SECS)?;
        if jwks_cache_ttl_seconds > JWKS_CACHE_TTL_SECS_LIMIT {
            return Err(anyhow::anyhow!(
                "KEYCLOAK_JWKS_CACHE_TTL_SECS must be at most {}",
                JWKS_CACHE_TTL_SECS_LIMIT
            ));
        }

        let issuer = lookup("KEYCLOAK_ISSUER").map(|s| s.trim_end_matches('/').to_string());
        let jwks_url = lookup("KEYCLOAK_JWKS_URL").or_else(|| {
            issuer
                .as_ref()
                .map(|issuer| format!("{}/protocol/openid-connect/certs", issuer))
        });
        let keycloak = KeycloakConfig {
            issuer,
            jwks_url,
            audience: lookup("KEYCLOAK_AUDIENCE"),
            jwks_cache_ttl_seconds,
        };

        let millis = |key: &str, default: u64| -> Result<Duration, anyhow::Error> {
            parse_or(&lookup, key, default).map(Duration::from_millis)
        };
        let breaker = BreakerPolicy {
            timeout: millis("BREAKER_TIMEOUT_MS", BREAKER_TIMEOUT_MS)?,
            error_threshold_percentage: parse_or(
                &lookup,
                "BREAKER_ERROR_THRESHOLD_PERCENTAGE",
                BREAKER_ERROR_THRESHOLD_PERCENTAGE,
            )?,
            reset_timeout: millis("BREAKER_RESET_TIMEOUT_MS", BREAKER_RESET_TIMEOUT_MS)?,
            rolling_window: millis("BREAKER_ROLLING_WINDOW_MS", BREAKER_ROLLING_WINDOW_MS)?,
            rolling_buckets: parse_or(
                &lookup,
                "BREAKER_ROLLING_BUCKETS",
                BREAKER_ROLLING_BUCKETS,
            )?,
            volume_threshold: parse_or(&lookup, "BREAKER_VOLUME_THRESHOLD", 0)?,
        };

        Ok(Self {
            base: BaseConfig {
                server_port,
                cors_origins,
                environment,
            },
            storage_backend,
            drive,
            local_storage_path: PathBuf::from(
                lookup("LOCAL_STORAGE_PATH").unwrap_or_else(|| "storage".to_string()),
            ),
            upload_dir: PathBuf::from(
                lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            ),
            max_file_size_bytes,
            keycloak,
            breaker,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.keycloak.jwks_url.is_none() {
            return Err(anyhow::anyhow!(
                "KEYCLOAK_ISSUER or KEYCLOAK_JWKS_URL must be set"
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.storage_backend == StorageBackend::Drive
            && self.drive.parent_folder_id.trim().is_empty()
        {
            return Err(anyhow::anyhow!(
                "DRIVE_PARENT_FOLDER_ID must not be empty when using the drive backend"
            ));
        }

        self.breaker.validate()
    }
}

/// Parses `key` when set; an unparsable value is an error, never the default.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, value, e)),
        None => Ok(default),
    }
}
