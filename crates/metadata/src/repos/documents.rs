//! Document and folder repository.

use crate::error::MetadataResult;
use crate::models::{DocumentRow, FolderEntryRow, FolderRow};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for document and folder operations.
///
/// Folder operations that touch multiple tables (rename, delete) run in
/// a single transaction so the projection never references a missing
/// folder or metadata record.
#[async_trait]
pub trait DocumentRepo: Send + Sync {
    /// Create a document.
    async fn create_document(&self, document: &DocumentRow) -> MetadataResult<()>;

    /// Get a document by ID.
    async fn get_document(&self, document_id: Uuid) -> MetadataResult<Option<DocumentRow>>;

    /// List documents owned by a user, most recently opened first.
    async fn list_documents_for_owner(&self, owner_id: Uuid) -> MetadataResult<Vec<DocumentRow>>;

    /// Update name, text, tags, and updated_at.
    async fn update_document(&self, document: &DocumentRow) -> MetadataResult<()>;

    /// Record that the document was opened.
    async fn touch_document_opened(
        &self,
        document_id: Uuid,
        opened_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete a document and everything attached to it in one
    /// transaction: folder entries, metadata records, folders, and the
    /// document row. Content refcounts are decremented; content rows are
    /// left for the sweep. Returns the number of metadata records removed.
    async fn delete_document(&self, document_id: Uuid) -> MetadataResult<u64>;

    /// Create a folder. Fails if the name exists in the document.
    async fn create_folder(&self, folder: &FolderRow) -> MetadataResult<()>;

    /// Rename a folder and re-point its entries in one transaction.
    async fn rename_folder(
        &self,
        document_id: Uuid,
        old_name: &str,
        new_name: &str,
        renamed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete a folder, its entries, and their metadata records in one
    /// transaction, decrementing content refcounts. Returns the number
    /// of entries removed.
    async fn delete_folder(&self, document_id: Uuid, folder_name: &str) -> MetadataResult<u64>;

    /// List folders of a document, sorted by name.
    async fn list_folders(&self, document_id: Uuid) -> MetadataResult<Vec<FolderRow>>;

    /// List all projection entries of a document, grouped by folder in
    /// attach order.
    async fn list_folder_entries(&self, document_id: Uuid) -> MetadataResult<Vec<FolderEntryRow>>;

    /// Get the projection entry for a resource.
    async fn get_folder_entry(
        &self,
        document_id: Uuid,
        resource_id: Uuid,
    ) -> MetadataResult<Option<FolderEntryRow>>;
}
