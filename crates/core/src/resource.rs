//! Resource metadata and content record types.
//!
//! A [`ResourceMeta`] exists per logical upload within a document; the
//! [`Resource`] content record is keyed by content hash and shared by
//! every metadata record whose upload bytes hash-match.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum length for resource names.
pub const MAX_RESOURCE_NAME_LEN: usize = 256;

/// Maximum length for notes and summaries.
pub const MAX_NOTES_LEN: usize = 64 * 1024;

/// Unique identifier for a resource metadata record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Generate a new random resource ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidId(format!("invalid resource ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-upload resource metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Metadata record identifier.
    pub id: ResourceId,
    /// Document this resource is attached to.
    pub document_id: Uuid,
    /// Hash of the underlying content record.
    pub content_hash: ContentHash,
    /// Folder the resource lives in.
    pub folder: String,
    /// Resource display name.
    pub name: String,
    /// Normalized file type.
    pub file_type: String,
    /// Free-text notes.
    pub notes: String,
    /// Summary text.
    pub summary: String,
    /// Tags.
    pub tags: Vec<String>,
    /// When the resource was attached.
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
    /// When the resource was last opened.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_opened: Option<OffsetDateTime>,
    /// When the metadata was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Deduplicated content record, keyed by content hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    /// Content hash key.
    pub content_hash: ContentHash,
    /// Extracted markdown/text content.
    pub markdown: String,
    /// Object store key holding the raw bytes.
    pub object_key: String,
    /// Size of the stored bytes.
    pub size_bytes: u64,
}

/// Response from attaching a resource to a document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachResourceResponse {
    /// The created metadata record.
    pub resource_id: String,
    /// Content hash of the uploaded bytes.
    pub content_hash: String,
    /// Folder the resource was filed into.
    pub folder: String,
    /// True when the bytes hash-matched an existing content record.
    pub deduplicated: bool,
}

/// Request to update resource metadata. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateResourceMetaRequest {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Request to move a resource to another folder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveResourceRequest {
    pub folder: String,
}

/// Validate a resource name.
pub fn validate_resource_name(name: &str) -> crate::Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_RESOURCE_NAME_LEN {
        return Err(crate::Error::InvalidName(format!(
            "resource name must be 1-{MAX_RESOURCE_NAME_LEN} characters"
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidName(
            "resource name contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Normalize a MIME content type into a short file-type label.
///
/// Unknown types fall back to the subtype with non-alphanumeric
/// characters stripped, capped at 16 chars. Anything unparseable
/// becomes "bin".
pub fn file_type_from_content_type(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/pdf" => return "pdf".to_string(),
        "text/markdown" => return "md".to_string(),
        "text/plain" => return "txt".to_string(),
        "text/csv" => return "csv".to_string(),
        "text/html" => return "html".to_string(),
        "application/json" => return "json".to_string(),
        "image/png" => return "png".to_string(),
        "image/jpeg" => return "jpg".to_string(),
        _ => {}
    }

    let subtype = essence.split('/').nth(1).unwrap_or("");
    let cleaned: String = subtype
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}

/// Build the object store key for a content hash.
pub fn object_key_for_hash(hash: &ContentHash) -> String {
    format!("resources/{hash}")
}
