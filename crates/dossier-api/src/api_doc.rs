//! OpenAPI documentation.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use crate::setup::routes::health;
use dossier_core::models;
use dossier_infra::{CircuitSnapshot, CircuitState};

/// Keycloak access tokens are sent as `Authorization: Bearer <jwt>`.
struct BearerToken;

impl Modify for BearerToken {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dossier API",
        version = "0.1.0",
        description = "Document submission gateway. Authenticated students upload their application documents into a personal storage folder and check what they have submitted."
    ),
    paths(
        handlers::upload::upload_documents,
        handlers::status::submission_status,
        handlers::protected::greet,
        health::health_check,
    ),
    components(
        schemas(
            models::MessageResponse,
            models::GreetingResponse,
            models::SubmissionStatusResponse,
            models::SubmissionState,
            health::HealthResponse,
            CircuitSnapshot,
            CircuitState,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerToken),
    tags(
        (name = "submissions", description = "Document upload and submission status"),
        (name = "auth", description = "Identity checks"),
        (name = "health", description = "Service health and circuit breaker state")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = get_openapi_spec();
        for path in ["/api/upload", "/api/status", "/api/protegida", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_token"));
    }
}
