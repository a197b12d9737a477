//! Dossier Storage Library
//!
//! Remote storage abstraction for submission folders and the backends that
//! implement it: Google Drive, the local filesystem and process memory.
//!
//! # Identifiers
//!
//! Every backend hands out opaque string ids for folders and files. Callers
//! never build ids themselves; they only pass back ids a backend returned (or
//! the configured parent folder id).

pub mod drive;
pub mod factory;
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use dossier_core::StorageBackend;
pub use drive::{
    ClientSecret, ClientSecrets, DriveEndpoints, DriveStorage, GoogleOAuthClient, OAuthToken,
    TokenStore,
};
pub use factory::create_storage;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use traits::{ContentReader, RemoteEntry, Storage, StorageError, StorageResult};
