//! Data models for the application

mod identity;
mod submission;

pub use identity::*;
pub use submission::*;
