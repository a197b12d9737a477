use crate::auth::AuthUser;
use crate::error::ErrorResponse;
use axum::Json;
use dossier_core::models::GreetingResponse;

/// Echoes the verified identity back to the caller.
#[utoipa::path(
    get,
    path = "/api/protegida",
    tag = "auth",
    responses(
        (status = 200, description = "Caller is authenticated", body = GreetingResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn greet(AuthUser(user): AuthUser) -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: format!(
            "Hola, {} {}! Esta es una ruta protegida.",
            user.given_name, user.family_name
        ),
        email: user.email,
        username: user.preferred_username,
    })
}
