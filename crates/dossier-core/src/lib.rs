//! Dossier Core Library
//!
//! Domain models, error types and configuration shared by every Dossier crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BreakerPolicy, Config, DriveConfig, KeycloakConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{SubmissionStatus, UserFolderKey, UserIdentity};
pub use storage_types::StorageBackend;
