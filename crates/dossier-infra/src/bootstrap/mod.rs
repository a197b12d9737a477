//! One-time acquisition of remote storage credentials.
//!
//! The gateway only ever reads the cached token record and refuses to start
//! without one. The interactive exchange (consent URL, operator-entered code,
//! token request) runs from the provisioning command. The breaker deadline
//! covers the token request only; waiting for the operator is not timed.

use std::sync::Arc;

use async_trait::async_trait;
use dossier_core::constants::DRIVE_SCOPE;
use dossier_storage::{GoogleOAuthClient, OAuthToken, StorageError, TokenStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::resilience::{CircuitBreaker, CircuitBreakerError};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("no stored credentials at {path}; run `dossier authorize` to create them")]
    Missing { path: String },

    #[error(transparent)]
    Guarded(#[from] CircuitBreakerError<StorageError>),

    #[error("failed to read the authorization code")]
    Operator(#[source] anyhow::Error),

    #[error("authorization code was empty")]
    EmptyCode,

    #[error("failed to persist credentials")]
    Persist(#[source] StorageError),
}

/// Operator-facing channel supplying the one-time authorization code.
#[async_trait]
pub trait AuthorizationCodeSource: Send + Sync {
    async fn authorization_code(&self, authorization_url: &str) -> anyhow::Result<String>;
}

/// Exchange of an authorization code for a token record.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    fn authorization_url(&self) -> String;

    async fn exchange(&self, code: &str) -> Result<OAuthToken, StorageError>;
}

#[async_trait]
impl TokenExchange for GoogleOAuthClient {
    fn authorization_url(&self) -> String {
        GoogleOAuthClient::authorization_url(self, &[DRIVE_SCOPE])
    }

    async fn exchange(&self, code: &str) -> Result<OAuthToken, StorageError> {
        self.exchange_code(code).await
    }
}

/// Prints the consent URL and reads the code from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinCodeSource;

#[async_trait]
impl AuthorizationCodeSource for StdinCodeSource {
    async fn authorization_code(&self, authorization_url: &str) -> anyhow::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(
                format!(
                    "Authorize this app by visiting this url:\n{}\nEnter the code from that page here: ",
                    authorization_url
                )
                .as_bytes(),
            )
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line.trim().to_string())
    }
}

pub struct AuthBootstrap {
    store: TokenStore,
    breaker: Arc<CircuitBreaker>,
}

impl AuthBootstrap {
    pub fn new(store: TokenStore, breaker: Arc<CircuitBreaker>) -> Self {
        Self { store, breaker }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The cached token record, if one exists.
    pub async fn load_cached(&self) -> Result<Option<OAuthToken>, BootstrapError> {
        let store = &self.store;
        Ok(self.breaker.fire(|| store.load()).await?)
    }

    /// The cached token record; its absence is an error.
    pub async fn require_cached(&self) -> Result<OAuthToken, BootstrapError> {
        self.load_cached()
            .await?
            .ok_or_else(|| BootstrapError::Missing {
                path: self.store.path().display().to_string(),
            })
    }

    /// Cached record when present, otherwise the interactive exchange.
    pub async fn acquire(
        &self,
        exchange: &dyn TokenExchange,
        codes: &dyn AuthorizationCodeSource,
    ) -> Result<OAuthToken, BootstrapError> {
        if let Some(token) = self.load_cached().await? {
            tracing::info!(path = %self.store.path().display(), "Using stored credentials");
            return Ok(token);
        }
        self.authorize(exchange, codes).await
    }

    /// Always runs the interactive exchange and overwrites any stored record.
    pub async fn authorize(
        &self,
        exchange: &dyn TokenExchange,
        codes: &dyn AuthorizationCodeSource,
    ) -> Result<OAuthToken, BootstrapError> {
        let url = exchange.authorization_url();
        let code = codes
            .authorization_code(&url)
            .await
            .map_err(BootstrapError::Operator)?;
        if code.trim().is_empty() {
            return Err(BootstrapError::EmptyCode);
        }

        let token = self.breaker.fire(|| exchange.exchange(&code)).await?;

        self.store
            .save(&token)
            .await
            .map_err(BootstrapError::Persist)?;
        tracing::info!(
            path = %self.store.path().display(),
            has_refresh_token = token.refresh_token.is_some(),
            "Credentials acquired"
        );
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::BreakerPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    fn token(access: &str) -> OAuthToken {
        OAuthToken {
            access_token: access.to_string(),
            refresh_token: Some("1//refresh".to_string()),
            scope: Some(DRIVE_SCOPE.to_string()),
            token_type: "Bearer".to_string(),
            expiry_date: None,
        }
    }

    #[derive(Default)]
    struct FakeExchange {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TokenExchange for FakeExchange {
        fn authorization_url(&self) -> String {
            "https://accounts.example/consent".to_string()
        }

        async fn exchange(&self, code: &str) -> Result<OAuthToken, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::AuthError("invalid_grant".to_string()));
            }
            Ok(token(&format!("access-for-{}", code)))
        }
    }

    struct SlowOperator {
        wait: Duration,
        prompts: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationCodeSource for SlowOperator {
        async fn authorization_code(&self, authorization_url: &str) -> anyhow::Result<String> {
            assert_eq!(authorization_url, "https://accounts.example/consent");
            self.prompts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.wait).await;
            Ok("4/abc".to_string())
        }
    }

    fn operator(wait: Duration) -> SlowOperator {
        SlowOperator {
            wait,
            prompts: AtomicUsize::new(0),
        }
    }

    fn bootstrap(dir: &std::path::Path) -> AuthBootstrap {
        AuthBootstrap::new(
            TokenStore::new(dir.join("token.json")),
            Arc::new(CircuitBreaker::new("bootstrap", BreakerPolicy::default())),
        )
    }

    #[tokio::test]
    async fn cached_record_skips_interaction() {
        let dir = tempdir().unwrap();
        let bootstrap = bootstrap(dir.path());
        bootstrap.store().save(&token("cached")).await.unwrap();

        let exchange = FakeExchange::default();
        let operator = operator(Duration::ZERO);
        let acquired = bootstrap.acquire(&exchange, &operator).await.unwrap();

        assert_eq!(acquired.access_token, "cached");
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert_eq!(operator.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn operator_wait_is_not_timed() {
        let dir = tempdir().unwrap();
        let policy = BreakerPolicy {
            timeout: Duration::from_millis(50),
            ..BreakerPolicy::default()
        };
        let bootstrap = AuthBootstrap::new(
            TokenStore::new(dir.path().join("token.json")),
            Arc::new(CircuitBreaker::new("bootstrap", policy)),
        );
        let exchange = FakeExchange::default();

        let acquired = bootstrap
            .acquire(&exchange, &operator(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(acquired.access_token, "access-for-4/abc");
        assert_eq!(
            bootstrap.store().load().await.unwrap(),
            Some(acquired),
            "exchanged record is persisted"
        );
    }

    #[tokio::test]
    async fn failed_exchange_persists_nothing_and_opens_breaker() {
        let dir = tempdir().unwrap();
        let bootstrap = bootstrap(dir.path());
        let exchange = FakeExchange {
            fail: true,
            ..FakeExchange::default()
        };

        let err = bootstrap
            .authorize(&exchange, &operator(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Guarded(CircuitBreakerError::Upstream { .. })
        ));
        assert!(bootstrap.store().load().await.unwrap().is_none());

        let err = bootstrap
            .authorize(&exchange, &operator(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Guarded(CircuitBreakerError::Open { .. })
        ));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn require_cached_reports_missing_record() {
        let dir = tempdir().unwrap();
        let err = bootstrap(dir.path()).require_cached().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Missing { .. }));
        assert!(err.to_string().contains("dossier authorize"));
    }
}
