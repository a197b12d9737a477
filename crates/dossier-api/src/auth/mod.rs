pub mod keycloak;
pub mod middleware;
pub mod models;

pub use keycloak::KeycloakVerifier;
pub use middleware::{auth_middleware, TokenVerifier};
pub use models::{AuthUser, KeycloakClaims};
