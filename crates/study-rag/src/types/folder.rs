//! Folder identity and blob path conventions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Directory under a user's namespace that holds generated papers
pub const PAPERS_DIR: &str = "papers";

/// Marker object that makes an otherwise empty folder visible in listings
pub const FOLDER_MARKER: &str = ".placeholder";

/// A folder owned by one user: `(user_id, folder_name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderKey {
    pub user_id: String,
    pub folder: String,
}

impl FolderKey {
    /// Build a key, validating the folder name
    pub fn new(user_id: impl Into<String>, folder: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let folder = folder.into().trim().to_string();
        validate_segment("user id", &user_id)?;
        validate_folder_name(&folder)?;
        Ok(Self { user_id, folder })
    }

    /// Blob prefix holding this folder's documents (trailing slash included)
    pub fn blob_prefix(&self) -> String {
        format!("{}/{}/", self.user_id, self.folder)
    }

    /// Blob path of a file inside this folder
    pub fn blob_path(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.user_id, self.folder, filename)
    }

    /// Blob path of the folder marker
    pub fn marker_path(&self) -> String {
        self.blob_path(FOLDER_MARKER)
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.folder)
    }
}

/// Blob prefix holding a user's generated papers
pub fn papers_prefix(user_id: &str) -> String {
    format!("{}/{}/", user_id, PAPERS_DIR)
}

/// Validate a user-supplied folder name
pub fn validate_folder_name(name: &str) -> Result<()> {
    validate_segment("folder_name", name)?;
    if name.eq_ignore_ascii_case(PAPERS_DIR) {
        return Err(Error::invalid_input(format!(
            "'{}' is reserved for generated papers",
            PAPERS_DIR
        )));
    }
    Ok(())
}

/// Validate a single path segment (folder or file name)
pub fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_input(format!("{} must not be empty", what)));
    }
    if value == "." || value == ".." || value.contains('/') || value.contains('\\') {
        return Err(Error::invalid_input(format!("{} '{}' is not a valid name", what, value)));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(Error::invalid_input(format!("{} contains control characters", what)));
    }
    Ok(())
}

/// Outcome of the idempotent "ensure folder marker exists" operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderMarker {
    /// The marker was written by this call
    Created,
    /// The folder already had the marker or other content
    AlreadyExists,
}
