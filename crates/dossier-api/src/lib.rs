//! Dossier API Library
//!
//! HTTP handlers, token verification and application setup for the document
//! submission gateway.

mod api_doc;
mod handlers;
mod utils;

pub mod auth;
pub mod error;
pub mod services;
pub mod setup;
pub mod state;

pub use error::ErrorResponse;
