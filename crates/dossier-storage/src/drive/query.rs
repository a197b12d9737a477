//! Drive `files.list` query strings.

use dossier_core::constants::FOLDER_MIME_TYPE;

/// Escape a value for use inside a single-quoted query literal.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Non-trashed folders named exactly `name` directly under `parent_id`.
pub fn folder_by_name(parent_id: &str, name: &str) -> String {
    format!(
        "mimeType='{}' and name='{}' and '{}' in parents and trashed = false",
        FOLDER_MIME_TYPE,
        escape_literal(name),
        escape_literal(parent_id)
    )
}

/// Non-trashed immediate children of `folder_id`.
pub fn children_of(folder_id: &str) -> String {
    format!("'{}' in parents and trashed = false", escape_literal(folder_id))
}
