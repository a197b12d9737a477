use async_trait::async_trait;
use dossier_api::auth::TokenVerifier;
use dossier_core::{AppError, UserIdentity};
use std::collections::HashMap;

pub const TEST_ISSUER: &str = "https://sso.example.edu/realms/estudiantes";

/// Token accepted for Ana Ruiz (`aruiz`).
pub const ANA_TOKEN: &str = "token-ana-ruiz";
/// Token accepted for Luis Pérez (`lperez`).
pub const LUIS_TOKEN: &str = "token-luis-perez";

pub fn ana() -> UserIdentity {
    UserIdentity {
        given_name: "Ana".to_string(),
        family_name: "Ruiz".to_string(),
        preferred_username: "aruiz".to_string(),
        email: "ana.ruiz@example.edu".to_string(),
    }
}

pub fn luis() -> UserIdentity {
    UserIdentity {
        given_name: "Luis".to_string(),
        family_name: "Pérez".to_string(),
        preferred_username: "lperez".to_string(),
        email: String::new(),
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Accepts a fixed set of opaque tokens instead of verifying JWTs.
pub struct StaticVerifier {
    tokens: HashMap<String, UserIdentity>,
}

impl Default for StaticVerifier {
    fn default() -> Self {
        let tokens = [(ANA_TOKEN, ana()), (LUIS_TOKEN, luis())]
            .into_iter()
            .map(|(token, identity)| (token.to_string(), identity))
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<UserIdentity, AppError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))
    }
}
