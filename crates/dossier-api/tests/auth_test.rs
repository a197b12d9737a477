//! Authentication, health and documentation endpoint tests.
//!
//! Run with: `cargo test -p dossier-api --test auth_test`

mod helpers;

use helpers::auth::{bearer, ANA_TOKEN, LUIS_TOKEN};
use helpers::setup_test_app;
use serde_json::Value;

#[tokio::test]
async fn test_protected_route_greets_caller() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/protegida")
        .add_header("Authorization", bearer(ANA_TOKEN))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(
        body,
        serde_json::json!({
            "message": "Hola, Ana Ruiz! Esta es una ruta protegida.",
            "email": "ana.ruiz@example.edu",
            "username": "aruiz"
        })
    );
}

#[tokio::test]
async fn test_missing_email_is_empty_string() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/protegida")
        .add_header("Authorization", bearer(LUIS_TOKEN))
        .await;

    let body: Value = response.json();
    assert_eq!(body["email"], "");
    assert_eq!(body["username"], "lperez");
}

#[tokio::test]
async fn test_protected_routes_reject_missing_token() {
    let app = setup_test_app().await;

    for path in ["/api/protegida", "/api/status"] {
        let response = app.client().get(path).await;
        assert_eq!(response.status_code(), 401, "{}", path);
        let body: Value = response.json();
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_protected_routes_reject_unknown_token() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/status")
        .add_header("Authorization", bearer("forged"))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(app.storage.folders_created(), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/protegida")
        .add_header("Authorization", format!("Basic {}", ANA_TOKEN))
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_health_reports_backend_and_circuits() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert!(body["circuits"].as_array().is_some_and(|c| !c.is_empty()));
}

#[tokio::test]
async fn test_liveness() {
    let app = setup_test_app().await;

    let response = app.client().get("/live").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_openapi_document_is_public() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["paths"]["/api/upload"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_token"].is_object());
}
