//! Fixed identifiers shared by the API and the storage layer.

/// Multipart field names accepted by the submission endpoint, in form order.
/// Each field carries at most one document.
pub const DOCUMENT_FIELDS: [&str; 5] = [
    "documentoIdentidad",
    "formatoMaterias",
    "seguro",
    "cartaAceptacion",
    "cartaRecomendacion",
];

/// Folder that holds every per-user submission folder unless overridden.
pub const DEFAULT_PARENT_FOLDER_ID: &str = "1MDkQRh6quSH_z9qmnxo_dQCb-1rI1sPm";

/// MIME type Drive uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// OAuth scope requested during provisioning.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// User-facing replies. Clients already match on this wording.
pub const SUBMISSION_RECEIVED_MESSAGE: &str = "Archivos subidos a Google Drive correctamente.";

pub const STORAGE_UNAVAILABLE_MESSAGE: &str =
    "El servicio de almacenamiento no está disponible. Intente más tarde.";

pub fn is_document_field(name: &str) -> bool {
    DOCUMENT_FIELDS.contains(&name)
}
