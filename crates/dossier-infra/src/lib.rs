//! Dossier Infrastructure Library
//!
//! Shared infrastructure used by the gateway and the provisioning CLI:
//! - Circuit breakers guarding every remote storage call
//! - Credential bootstrap for the storage backend
//! - Telemetry initialization
//! - Request ID middleware

pub mod bootstrap;
pub mod middleware;
pub mod resilience;
pub mod telemetry;

// Re-export commonly used types
pub use bootstrap::{
    AuthBootstrap, AuthorizationCodeSource, BootstrapError, StdinCodeSource, TokenExchange,
};
pub use resilience::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakers, CircuitEvent, CircuitSnapshot,
    CircuitState, OperationCategory,
};
