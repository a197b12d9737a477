use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::SubmissionState;
use crate::utils::upload::collect_submission;
use axum::{
    extract::{Multipart, State},
    Json,
};
use dossier_core::constants::SUBMISSION_RECEIVED_MESSAGE;
use dossier_core::models::MessageResponse;

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "submissions",
    request_body(
        content = inline(Object),
        content_type = "multipart/form-data",
        description = "One optional file per field: documentoIdentidad, formatoMaterias, seguro, cartaAceptacion, cartaRecomendacion"
    ),
    responses(
        (status = 200, description = "All documents stored", body = MessageResponse),
        (status = 400, description = "Unknown or repeated field", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = MessageResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn upload_documents(
    State(state): State<SubmissionState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let files = collect_submission(multipart, &state.upload_dir, state.max_file_size).await?;

    state.uploads.submit(&user.folder_key(), files).await?;

    Ok(Json(MessageResponse::new(SUBMISSION_RECEIVED_MESSAGE)))
}
