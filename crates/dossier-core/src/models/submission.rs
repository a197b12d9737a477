use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of looking up a user's submission folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionStatus {
    pub found: bool,
    /// Child names in the order the store returned them.
    pub files: Vec<String>,
}

impl SubmissionStatus {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionState {
    Found,
    NotFound,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionStatusResponse {
    pub status: SubmissionState,
    #[serde(rename = "uploadedFiles")]
    pub uploaded_files: Vec<String>,
}

impl From<SubmissionStatus> for SubmissionStatusResponse {
    fn from(status: SubmissionStatus) -> Self {
        Self {
            status: if status.found {
                SubmissionState::Found
            } else {
                SubmissionState::NotFound
            },
            uploaded_files: status.files,
        }
    }
}

/// Plain `{message}` body used for submission results and degraded-service replies.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GreetingResponse {
    pub message: String,
    pub email: String,
    pub username: String,
}
