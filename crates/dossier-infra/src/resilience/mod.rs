//! Resilience primitives for remote storage calls.

mod breaker;
mod registry;

pub use breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitEvent, CircuitSnapshot, CircuitState,
};
pub use registry::{CircuitBreakers, OperationCategory};
