use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::SubmissionState;
use axum::{extract::State, Json};
use dossier_core::models::{MessageResponse, SubmissionStatusResponse};

#[utoipa::path(
    get,
    path = "/api/status",
    tag = "submissions",
    responses(
        (status = 200, description = "Submission folder lookup", body = SubmissionStatusResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = MessageResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn submission_status(
    State(state): State<SubmissionState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SubmissionStatusResponse>, HttpAppError> {
    let status = state.status.status(&user.folder_key()).await?;
    Ok(Json(status.into()))
}
