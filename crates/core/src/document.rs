//! Document and folder types.
//!
//! A document owns a set of uniquely-named folders; each folder holds
//! lightweight [`ResourceCompressed`] projections of the resources
//! attached to it, so a document renders without fetching full
//! metadata or content records.

use crate::resource::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum length for document names.
pub const MAX_DOCUMENT_NAME_LEN: usize = 256;

/// Maximum length for folder names.
pub const MAX_FOLDER_NAME_LEN: usize = 64;

/// Maximum number of tags on a document or resource.
pub const MAX_TAGS: usize = 32;

/// Maximum length of a single tag.
pub const MAX_TAG_LEN: usize = 64;

/// Unique identifier for a document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a new random document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidId(format!("invalid document ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lightweight projection of an attached resource, embedded in folder
/// listings. Display fields are copies of the metadata record and are
/// refreshed in the same transaction as any metadata mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceCompressed {
    /// The resource this entry projects.
    pub resource_id: ResourceId,
    /// Resource display name.
    pub name: String,
    /// Normalized file type (e.g. "pdf", "md").
    pub file_type: String,
    /// When the resource was attached.
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
    /// When the resource was last opened.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_opened: Option<OffsetDateTime>,
}

/// A named folder and its resource projections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Folder {
    /// Folder name, unique within the document.
    pub name: String,
    /// Attached resources, in attach order.
    pub resources: Vec<ResourceCompressed>,
}

/// A full document view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub id: DocumentId,
    /// Owning user.
    pub owner_id: Uuid,
    /// Document name.
    pub name: String,
    /// Free-text body.
    pub text: String,
    /// Folders, sorted by name.
    pub folders: Vec<Folder>,
    /// Tags.
    pub tags: Vec<String>,
    /// When the document was created.
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
    /// When the document was last opened.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_opened: Option<OffsetDateTime>,
    /// When the document was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Request to create a document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Request to update a document. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Request to create a folder explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
}

/// Request to rename a folder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenameFolderRequest {
    pub new_name: String,
}

/// Validate a document name.
pub fn validate_document_name(name: &str) -> crate::Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_DOCUMENT_NAME_LEN {
        return Err(crate::Error::InvalidName(format!(
            "document name must be 1-{MAX_DOCUMENT_NAME_LEN} characters"
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidName(
            "document name contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a folder name.
///
/// Folder names key the folder table, so they must be non-empty,
/// bounded, and free of control characters and path separators.
pub fn validate_folder_name(name: &str) -> crate::Result<()> {
    if name.is_empty() || name.len() > MAX_FOLDER_NAME_LEN {
        return Err(crate::Error::InvalidFolderName(format!(
            "folder name must be 1-{MAX_FOLDER_NAME_LEN} characters"
        )));
    }
    if name != name.trim() {
        return Err(crate::Error::InvalidFolderName(
            "folder name has leading or trailing whitespace".to_string(),
        ));
    }
    if name.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        return Err(crate::Error::InvalidFolderName(
            "folder name contains control characters or path separators".to_string(),
        ));
    }
    Ok(())
}

/// Validate a tag list.
pub fn validate_tags(tags: &[String]) -> crate::Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(crate::Error::InvalidTag(format!(
            "at most {MAX_TAGS} tags allowed, got {}",
            tags.len()
        )));
    }
    for tag in tags {
        if tag.is_empty() || tag.len() > MAX_TAG_LEN {
            return Err(crate::Error::InvalidTag(format!(
                "tag must be 1-{MAX_TAG_LEN} characters"
            )));
        }
        if tag.chars().any(|c| c.is_control()) {
            return Err(crate::Error::InvalidTag(
                "tag contains control characters".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_folder_name() {
        assert!(validate_folder_name("General").is_ok());
        assert!(validate_folder_name("Q3 Research").is_ok());
        assert!(validate_folder_name("").is_err());
        assert!(validate_folder_name(" padded ").is_err());
        assert!(validate_folder_name("a/b").is_err());
        assert!(validate_folder_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_tags() {
        assert!(validate_tags(&["energy".to_string(), "2024".to_string()]).is_ok());
        assert!(validate_tags(&[String::new()]).is_err());
        assert!(validate_tags(&vec!["t".to_string(); MAX_TAGS + 1]).is_err());
    }

    #[test]
    fn test_validate_document_name() {
        assert!(validate_document_name("Quarterly report").is_ok());
        assert!(validate_document_name("  ").is_err());
        assert!(validate_document_name(&"x".repeat(300)).is_err());
    }
}
