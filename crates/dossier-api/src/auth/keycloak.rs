//! Keycloak access-token verification
//!
//! Tokens are RS256/ES256 JWTs signed with the realm keys published at the
//! realm's JWKS endpoint. Keys are cached per `kid` for a configurable TTL; an
//! unknown `kid` triggers a fresh fetch so realm key rotation is picked up
//! without a restart.

use crate::auth::middleware::TokenVerifier;
use crate::auth::models::KeycloakClaims;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dossier_core::{AppError, KeycloakConfig, UserIdentity};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JWKS (JSON Web Key Set) structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// JSON Web Key structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(rename = "kty")]
    pub key_type: String,
    #[serde(rename = "kid")]
    pub key_id: Option<String>,
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    #[serde(rename = "alg")]
    pub algorithm: Option<String>,
    #[serde(rename = "n")]
    pub modulus: Option<String>,
    #[serde(rename = "e")]
    pub exponent: Option<String>,
    #[serde(rename = "x")]
    pub x_coordinate: Option<String>,
    #[serde(rename = "y")]
    pub y_coordinate: Option<String>,
    #[serde(rename = "crv")]
    pub curve: Option<String>,
}

impl Jwk {
    /// Keycloak also publishes encryption keys (`use: enc`); only signing
    /// keys may verify tokens.
    fn is_signing_key(&self) -> bool {
        self.key_use.as_deref().map(|u| u == "sig").unwrap_or(true)
    }
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    expires_at: DateTime<Utc>,
}

/// Verifies bearer tokens issued by a Keycloak realm.
pub struct KeycloakVerifier {
    http: reqwest::Client,
    jwks_url: String,
    issuer: Option<String>,
    audience: Option<String>,
    cache: RwLock<HashMap<String, CachedKey>>,
    cache_ttl: TimeDelta,
    algorithms: Vec<Algorithm>,
}

impl KeycloakVerifier {
    pub fn new(http: reqwest::Client, config: &KeycloakConfig) -> Result<Self, AppError> {
        let jwks_url = config.jwks_url.clone().ok_or_else(|| {
            AppError::Internal("KEYCLOAK_ISSUER or KEYCLOAK_JWKS_URL must be set".to_string())
        })?;

        Ok(Self {
            http,
            jwks_url,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            cache: RwLock::new(HashMap::new()),
            cache_ttl: i64::try_from(config.jwks_cache_ttl_seconds)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            algorithms: vec![Algorithm::RS256, Algorithm::ES256],
        })
    }

    async fn fetch_jwks(&self) -> Result<Jwks, AppError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .timeout(JWKS_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Unauthorized(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized(format!(
                "JWKS endpoint returned error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Unauthorized(format!("Failed to parse JWKS: {}", e)))
    }

    fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AppError> {
        match jwk.key_type.as_str() {
            "RSA" => {
                let n = jwk
                    .modulus
                    .as_ref()
                    .ok_or_else(|| AppError::Unauthorized("RSA key missing modulus".to_string()))?;
                let e = jwk.exponent.as_ref().ok_or_else(|| {
                    AppError::Unauthorized("RSA key missing exponent".to_string())
                })?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| AppError::Unauthorized(format!("Failed to create RSA key: {}", e)))
            }
            "EC" => {
                let x = jwk.x_coordinate.as_ref().ok_or_else(|| {
                    AppError::Unauthorized("EC key missing x coordinate".to_string())
                })?;
                let y = jwk.y_coordinate.as_ref().ok_or_else(|| {
                    AppError::Unauthorized("EC key missing y coordinate".to_string())
                })?;
                match jwk.curve.as_deref() {
                    Some("P-256") => {}
                    other => {
                        return Err(AppError::Unauthorized(format!(
                            "Unsupported EC curve: {:?} (only P-256 is supported)",
                            other
                        )))
                    }
                }
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| AppError::Unauthorized(format!("Failed to create EC key: {}", e)))
            }
            _ => Err(AppError::Unauthorized(format!(
                "Unsupported key type: {}",
                jwk.key_type
            ))),
        }
    }

    async fn get_decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, AppError> {
        let cache_key = kid.unwrap_or("default").to_string();

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&cache_key) {
                if cached.expires_at > Utc::now() {
                    return Ok(cached.key.clone());
                }
            }
        }

        let jwks = self.fetch_jwks().await?;
        let mut signing_keys = jwks.keys.iter().filter(|k| k.is_signing_key());

        let jwk = match kid {
            Some(kid) => signing_keys
                .find(|k| k.key_id.as_deref() == Some(kid))
                .ok_or_else(|| {
                    AppError::Unauthorized(format!("Key ID {} not found in JWKS", kid))
                })?,
            None => signing_keys
                .next()
                .ok_or_else(|| AppError::Unauthorized("No keys found in JWKS".to_string()))?,
        };

        let decoding_key = Self::jwk_to_decoding_key(jwk)?;

        self.cache.write().await.insert(
            cache_key,
            CachedKey {
                key: decoding_key.clone(),
                expires_at: Utc::now()
                    .checked_add_signed(self.cache_ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
        tracing::debug!(kid = ?kid, "Cached realm signing key");

        Ok(decoding_key)
    }

    /// Validate signature, expiry, issuer and (when configured) audience.
    pub async fn validate_token(&self, token: &str) -> Result<KeycloakClaims, AppError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token header: {}", e)))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(AppError::Unauthorized(format!(
                "Unsupported algorithm: {:?}. Supported: {:?}",
                header.alg, self.algorithms
            )));
        }

        let decoding_key = self.get_decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.algorithms = vec![header.alg];
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<KeycloakClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AppError::Unauthorized("Invalid token issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AppError::Unauthorized("Invalid token audience".to_string())
                }
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                    AppError::Unauthorized("Token is not yet valid (nbf)".to_string())
                }
                _ => AppError::Unauthorized(format!("Invalid or expired token: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl TokenVerifier for KeycloakVerifier {
    async fn verify(&self, token: &str) -> Result<UserIdentity, AppError> {
        self.validate_token(token).await?.into_identity()
    }
}
