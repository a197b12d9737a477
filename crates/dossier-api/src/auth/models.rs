use crate::error::ErrorResponse;
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode, Json};
use dossier_core::{AppError, UserIdentity};
use serde::{Deserialize, Serialize};

/// Claims read from a Keycloak access token.
///
/// Only the registered claims and the profile claims needed to name the
/// submission folder are decoded; everything else in the token is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl KeycloakClaims {
    /// The three name claims are required; a token without them cannot be
    /// mapped to a submission folder. A missing email is reported as empty.
    pub fn into_identity(self) -> Result<UserIdentity, AppError> {
        let required = |claim: Option<String>, name: &str| {
            claim
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Unauthorized(format!("Token is missing the {} claim", name)))
        };

        Ok(UserIdentity {
            given_name: required(self.given_name, "given_name")?,
            family_name: required(self.family_name, "family_name")?,
            preferred_username: required(self.preferred_username, "preferred_username")?,
            email: self.email.unwrap_or_default(),
        })
    }
}

/// Verified caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserIdentity);

// Extracted from request parts so it can be combined with Multipart
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "Missing authenticated user",
                    "UNAUTHORIZED",
                )),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> KeycloakClaims {
        KeycloakClaims {
            sub: "f3a1".to_string(),
            exp: 0,
            iat: None,
            nbf: None,
            given_name: Some("Ana".to_string()),
            family_name: Some("Ruiz".to_string()),
            preferred_username: Some("aruiz".to_string()),
            email: Some("ana.ruiz@example.edu".to_string()),
        }
    }

    #[test]
    fn claims_map_to_identity() {
        let identity = claims().into_identity().unwrap();
        assert_eq!(identity.folder_key().as_str(), "Ruiz_Ana_aruiz");
        assert_eq!(identity.email, "ana.ruiz@example.edu");
    }

    #[test]
    fn missing_name_claim_is_unauthorized() {
        let mut claims = claims();
        claims.preferred_username = None;
        assert!(matches!(
            claims.into_identity(),
            Err(AppError::Unauthorized(msg)) if msg.contains("preferred_username")
        ));
    }

    #[test]
    fn blank_name_claim_is_unauthorized() {
        let mut claims = claims();
        claims.family_name = Some("  ".to_string());
        assert!(claims.into_identity().is_err());
    }

    #[test]
    fn missing_email_is_empty() {
        let mut claims = claims();
        claims.email = None;
        assert_eq!(claims.into_identity().unwrap().email, "");
    }
}
