//! Multipart intake for document submissions.

use crate::services::{SubmissionFile, SubmissionFiles};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use dossier_core::constants::{is_document_field, DOCUMENT_FIELDS};
use dossier_core::AppError;
use std::path::Path;
use tokio::io::AsyncWriteExt;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", e.body_text()))
    }
}

/// Spool every document of a submission form into `upload_dir`.
///
/// Only the known document fields are accepted, each at most once. Files
/// larger than `max_file_size` are rejected. On any error the files spooled
/// so far are deleted when the partial map is dropped.
pub async fn collect_submission(
    mut multipart: Multipart,
    upload_dir: &Path,
    max_file_size: usize,
) -> Result<SubmissionFiles, AppError> {
    let mut files = SubmissionFiles::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if !is_document_field(&name) {
            return Err(AppError::InvalidInput(format!(
                "Unexpected field '{}'. Accepted fields: {}",
                name,
                DOCUMENT_FIELDS.join(", ")
            )));
        }
        if files.contains_key(&name) {
            return Err(AppError::InvalidInput(format!(
                "Field '{}' accepts a single file",
                name
            )));
        }

        let file = spool_field(field, &name, upload_dir, max_file_size).await?;
        tracing::debug!(
            field = %name,
            file_name = %file.file_name,
            size_bytes = file.size,
            "Document received"
        );
        files.insert(name, file);
    }

    Ok(files)
}

async fn spool_field(
    mut field: Field<'_>,
    name: &str,
    upload_dir: &Path,
    max_file_size: usize,
) -> Result<SubmissionFile, AppError> {
    let file_name = field
        .file_name()
        .and_then(client_file_name)
        .unwrap_or_else(|| name.to_string());
    let content_type = field
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(upload_dir)
        .map_err(|e| AppError::Internal(format!("Failed to create temporary file: {}", e)))?;
    let (std_file, path) = temp.into_parts();
    let mut out = tokio::fs::File::from_std(std_file);

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > max_file_size as u64 {
            return Err(AppError::PayloadTooLarge(format!(
                "File in field '{}' exceeds maximum allowed size of {} MB",
                name,
                max_file_size / 1024 / 1024
            )));
        }
        out.write_all(&chunk).await?;
    }
    out.flush().await?;

    Ok(SubmissionFile {
        field: name.to_string(),
        file_name,
        content_type,
        size,
        path,
    })
}

/// The client's file name without any directory part. `None` when nothing
/// usable is left.
pub fn client_file_name(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_file_name_keeps_plain_names() {
        assert_eq!(
            client_file_name("Carta de aceptación.pdf").as_deref(),
            Some("Carta de aceptación.pdf")
        );
    }

    #[test]
    fn client_file_name_strips_directories() {
        assert_eq!(
            client_file_name("C:\\Users\\ana\\dni.pdf").as_deref(),
            Some("dni.pdf")
        );
        assert_eq!(client_file_name("../../etc/passwd").as_deref(), Some("passwd"));
    }

    #[test]
    fn client_file_name_rejects_empty_names() {
        assert_eq!(client_file_name(""), None);
        assert_eq!(client_file_name("docs/"), None);
        assert_eq!(client_file_name(".."), None);
    }
}
