//! Submission services: folder resolution, uploads and status lookups.
//!
//! Every remote call made while serving a request runs inside the breaker of
//! its operation category.

pub mod folder;
pub mod status;
pub mod submission;

pub use folder::FolderResolver;
pub use status::StatusReporter;
pub use submission::{SubmissionFile, SubmissionFiles, SubmissionReceipt, UploadOrchestrator};
