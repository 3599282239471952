//! Resource repository.

use crate::error::MetadataResult;
use crate::models::{FolderEntryRow, ResourceMetaRow, ResourceRow};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Aggregate content-record statistics.
#[derive(Debug, Clone)]
pub struct ResourceStats {
    pub count: u64,
    pub total_size: u64,
    pub referenced_count: u64,
    pub unreferenced_count: u64,
}

/// Repository for resource content and metadata operations.
///
/// Attach, move, detach, and metadata updates are multi-record
/// mutations and run inside a single transaction each.
#[async_trait]
pub trait ResourceRepo: Send + Sync {
    /// Attach an uploaded resource to a document in one transaction:
    /// insert the content row if no row exists for its hash (otherwise
    /// refresh last_accessed_at), increment its refcount, insert the
    /// metadata record, create the target folder if absent, insert the
    /// projection entry, and touch the document.
    ///
    /// Returns true when the content row was created, false when the
    /// upload deduplicated against an existing record.
    async fn attach_resource(
        &self,
        resource: &ResourceRow,
        meta: &ResourceMetaRow,
        entry: &FolderEntryRow,
    ) -> MetadataResult<bool>;

    /// Get a content record by hash.
    async fn get_resource(&self, content_hash: &str) -> MetadataResult<Option<ResourceRow>>;

    /// Get a metadata record by ID.
    async fn get_meta(&self, resource_id: Uuid) -> MetadataResult<Option<ResourceMetaRow>>;

    /// List metadata records for a document, in attach order.
    async fn list_metas_for_document(
        &self,
        document_id: Uuid,
    ) -> MetadataResult<Vec<ResourceMetaRow>>;

    /// Count metadata records referencing a content hash.
    async fn count_metas_for_hash(&self, content_hash: &str) -> MetadataResult<u64>;

    /// Update metadata fields and refresh the projection entry's display
    /// fields in one transaction.
    async fn update_meta(&self, meta: &ResourceMetaRow) -> MetadataResult<()>;

    /// Record that the resource was opened, updating both the metadata
    /// record and its projection entry in one transaction.
    async fn touch_resource_opened(
        &self,
        resource_id: Uuid,
        opened_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Move a resource to another folder in one transaction, creating
    /// the target folder if absent. Moving to the current folder is a
    /// no-op; repeated moves neither duplicate nor lose the entry.
    async fn move_resource(
        &self,
        document_id: Uuid,
        resource_id: Uuid,
        target_folder: &str,
        moved_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Detach a resource in one transaction: delete the projection
    /// entry and metadata record, decrement the content refcount, touch
    /// the document. The content row survives while other metadata
    /// records reference it. Returns the content hash that was
    /// decremented.
    async fn detach_resource(&self, resource_id: Uuid) -> MetadataResult<String>;

    /// Aggregate content-record statistics.
    async fn resource_stats(&self) -> MetadataResult<ResourceStats>;

    /// Atomically delete refcount-0 content records created before
    /// `older_than`, up to `limit`. The refcount is re-checked per row
    /// inside the transaction so records re-referenced after selection
    /// are skipped. Returns only rows actually deleted; the caller is
    /// responsible for removing their stored objects.
    async fn sweep_unreferenced_resources(
        &self,
        older_than: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<ResourceRow>>;
}
