use std::fmt;

use serde::{Deserialize, Serialize};

/// Verified end-user identity, taken from identity-provider token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub given_name: String,
    pub family_name: String,
    pub preferred_username: String,
    pub email: String,
}

impl UserIdentity {
    pub fn folder_key(&self) -> UserFolderKey {
        UserFolderKey::from_identity(self)
    }
}

/// Deterministic per-user folder name: `{family_name}_{given_name}_{preferred_username}`.
///
/// The same identity always yields the same key. The key is both the search
/// term and the name given to a newly created folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserFolderKey(String);

impl UserFolderKey {
    pub fn from_identity(identity: &UserIdentity) -> Self {
        Self(format!(
            "{}_{}_{}",
            identity.family_name, identity.given_name, identity.preferred_username
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserFolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserFolderKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
