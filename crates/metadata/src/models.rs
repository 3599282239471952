//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Users and credentials
// =============================================================================

/// User account record.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_logged_in: Option<OffsetDateTime>,
}

/// Credential record for manual signup/login, keyed by email.
///
/// Kept separate from the user record so OAuth-only accounts carry no
/// password material.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub email: String,
    pub user_id: Uuid,
    /// Random per-user salt, hex encoded.
    pub salt: String,
    /// SHA-256(salt || password), hex encoded.
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Sessions
// =============================================================================

/// Bearer session record. The secret is never stored, only its hash.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    /// None for the bootstrap admin token.
    pub user_id: Option<Uuid>,
    pub token_hash: String,
    /// JSON array of scope strings.
    pub scopes: String,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    pub description: Option<String>,
}

// =============================================================================
// Documents and folders
// =============================================================================

/// Document record. Folder structure lives in folders/folder_entries.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub document_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub text: String,
    /// JSON array of tag strings.
    pub tags: String,
    pub date_added: OffsetDateTime,
    pub last_opened: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

/// Folder record. Folder names are unique within a document.
#[derive(Debug, Clone, FromRow)]
pub struct FolderRow {
    pub document_id: Uuid,
    pub folder_name: String,
    pub created_at: OffsetDateTime,
}

/// Folder entry: the ResourceCompressed projection row.
///
/// Display fields are denormalized copies of the resource_meta record;
/// every write that touches the meta refreshes them in the same
/// transaction. An attached resource lives in exactly one folder, which
/// the `(document_id, resource_id)` primary key enforces.
#[derive(Debug, Clone, FromRow)]
pub struct FolderEntryRow {
    pub document_id: Uuid,
    pub resource_id: Uuid,
    pub folder_name: String,
    pub resource_name: String,
    pub file_type: String,
    pub date_added: OffsetDateTime,
    pub last_opened: Option<OffsetDateTime>,
}

// =============================================================================
// Resources
// =============================================================================

/// Per-upload resource metadata record.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceMetaRow {
    pub resource_id: Uuid,
    pub document_id: Uuid,
    pub content_hash: String,
    pub resource_name: String,
    pub file_type: String,
    pub notes: String,
    pub summary: String,
    /// JSON array of tag strings.
    pub tags: String,
    pub date_added: OffsetDateTime,
    pub last_opened: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

/// Deduplicated content record, keyed by content hash.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub content_hash: String,
    pub markdown: String,
    pub object_key: String,
    pub size_bytes: i64,
    pub refcount: i64,
    pub created_at: OffsetDateTime,
    pub last_accessed_at: Option<OffsetDateTime>,
}
