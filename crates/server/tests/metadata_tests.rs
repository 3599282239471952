//! Store-level tests for the transactional document/resource consistency layer.

mod common;

use common::TestServer;
use common::fixtures::sha256_hash;
use curiocity_metadata::MetadataError;
use curiocity_metadata::models::{DocumentRow, FolderEntryRow, ResourceMetaRow, ResourceRow};
use time::OffsetDateTime;
use uuid::Uuid;

fn document_row(owner_id: Uuid) -> DocumentRow {
    let now = OffsetDateTime::now_utc();
    DocumentRow {
        document_id: Uuid::new_v4(),
        owner_id,
        name: "Test document".to_string(),
        text: String::new(),
        tags: "[]".to_string(),
        date_added: now,
        last_opened: None,
        updated_at: now,
    }
}

/// Build the three rows the attach operation takes, for given bytes.
fn attach_rows(
    document_id: Uuid,
    folder: &str,
    name: &str,
    bytes: &[u8],
) -> (ResourceRow, ResourceMetaRow, FolderEntryRow) {
    let now = OffsetDateTime::now_utc();
    let hash = sha256_hash(bytes);
    let resource_id = Uuid::new_v4();

    let resource = ResourceRow {
        content_hash: hash.clone(),
        markdown: String::from_utf8_lossy(bytes).into_owned(),
        object_key: format!("resources/{hash}"),
        size_bytes: bytes.len() as i64,
        refcount: 0,
        created_at: now,
        last_accessed_at: Some(now),
    };
    let meta = ResourceMetaRow {
        resource_id,
        document_id,
        content_hash: hash,
        resource_name: name.to_string(),
        file_type: "md".to_string(),
        notes: String::new(),
        summary: String::new(),
        tags: "[]".to_string(),
        date_added: now,
        last_opened: None,
        updated_at: now,
    };
    let entry = FolderEntryRow {
        document_id,
        resource_id,
        folder_name: folder.to_string(),
        resource_name: name.to_string(),
        file_type: "md".to_string(),
        date_added: now,
        last_opened: None,
    };

    (resource, meta, entry)
}

#[tokio::test]
async fn test_attach_is_atomic_and_dedups() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    let (r1, m1, e1) = attach_rows(doc.document_id, "Research", "a.md", b"payload");
    let inserted = metadata.attach_resource(&r1, &m1, &e1).await.unwrap();
    assert!(inserted);

    // Second attach of identical bytes: content row reused
    let (r2, m2, e2) = attach_rows(doc.document_id, "Research", "b.md", b"payload");
    let inserted = metadata.attach_resource(&r2, &m2, &e2).await.unwrap();
    assert!(!inserted);

    let resource = metadata
        .get_resource(&r1.content_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resource.refcount, 2);

    // Folder was created implicitly, once
    let folders = metadata.list_folders(doc.document_id).await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].folder_name, "Research");

    // Both entries and both metas exist
    assert_eq!(
        metadata
            .list_folder_entries(doc.document_id)
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        metadata
            .list_metas_for_document(doc.document_id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_detach_decrements_and_removes_projection() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    let (r1, m1, e1) = attach_rows(doc.document_id, "F", "a.md", b"shared");
    let (_r2, m2, e2) = attach_rows(doc.document_id, "F", "b.md", b"shared");
    metadata.attach_resource(&r1, &m1, &e1).await.unwrap();
    metadata.attach_resource(&r1, &m2, &e2).await.unwrap();

    let hash = metadata.detach_resource(m1.resource_id).await.unwrap();
    assert_eq!(hash, r1.content_hash);

    assert!(metadata.get_meta(m1.resource_id).await.unwrap().is_none());
    assert!(
        metadata
            .get_folder_entry(doc.document_id, m1.resource_id)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        metadata
            .get_resource(&hash)
            .await
            .unwrap()
            .unwrap()
            .refcount,
        1
    );

    // Detaching an unknown resource is NotFound
    let err = metadata.detach_resource(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, MetadataError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_document_decrements_per_meta() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    // Two metas in this document share one hash; a third is unique
    let (shared, m1, e1) = attach_rows(doc.document_id, "F", "a.md", b"shared");
    let (_s2, m2, e2) = attach_rows(doc.document_id, "F", "b.md", b"shared");
    let (unique, m3, e3) = attach_rows(doc.document_id, "G", "c.md", b"unique");
    metadata.attach_resource(&shared, &m1, &e1).await.unwrap();
    metadata.attach_resource(&shared, &m2, &e2).await.unwrap();
    metadata.attach_resource(&unique, &m3, &e3).await.unwrap();

    // Another document also references the shared hash
    let other = document_row(Uuid::new_v4());
    metadata.create_document(&other).await.unwrap();
    let (_s3, m4, e4) = attach_rows(other.document_id, "H", "d.md", b"shared");
    metadata.attach_resource(&shared, &m4, &e4).await.unwrap();

    let removed = metadata.delete_document(doc.document_id).await.unwrap();
    assert_eq!(removed, 3);

    // Shared hash was decremented twice (once per meta in the deleted
    // document), leaving the other document's reference
    assert_eq!(
        metadata
            .get_resource(&shared.content_hash)
            .await
            .unwrap()
            .unwrap()
            .refcount,
        1
    );
    // Unique hash dropped to zero but the row survives for the sweep
    assert_eq!(
        metadata
            .get_resource(&unique.content_hash)
            .await
            .unwrap()
            .unwrap()
            .refcount,
        0
    );

    assert!(
        metadata
            .get_document(doc.document_id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(metadata.list_folders(doc.document_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_folder_moves_entries() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    let (r, m, e) = attach_rows(doc.document_id, "Old", "a.md", b"x");
    metadata.attach_resource(&r, &m, &e).await.unwrap();

    metadata
        .rename_folder(doc.document_id, "Old", "New", OffsetDateTime::now_utc())
        .await
        .unwrap();

    let folders = metadata.list_folders(doc.document_id).await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].folder_name, "New");

    let entries = metadata.list_folder_entries(doc.document_id).await.unwrap();
    assert_eq!(entries[0].folder_name, "New");

    // Renaming onto an existing folder conflicts
    let (r2, m2, e2) = attach_rows(doc.document_id, "Other", "b.md", b"y");
    metadata.attach_resource(&r2, &m2, &e2).await.unwrap();
    let err = metadata
        .rename_folder(doc.document_id, "New", "Other", OffsetDateTime::now_utc())
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_move_resource_is_idempotent() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    let (r, m, e) = attach_rows(doc.document_id, "A", "a.md", b"x");
    metadata.attach_resource(&r, &m, &e).await.unwrap();

    let now = OffsetDateTime::now_utc();
    metadata
        .move_resource(doc.document_id, m.resource_id, "B", now)
        .await
        .unwrap();
    metadata
        .move_resource(doc.document_id, m.resource_id, "B", now)
        .await
        .unwrap();

    let entries = metadata.list_folder_entries(doc.document_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].folder_name, "B");
}

#[tokio::test]
async fn test_update_meta_refreshes_entry() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    let (r, mut m, e) = attach_rows(doc.document_id, "F", "before.md", b"x");
    metadata.attach_resource(&r, &m, &e).await.unwrap();

    m.resource_name = "after.md".to_string();
    m.notes = "updated".to_string();
    m.updated_at = OffsetDateTime::now_utc();
    metadata.update_meta(&m).await.unwrap();

    let entry = metadata
        .get_folder_entry(doc.document_id, m.resource_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.resource_name, "after.md");

    let stored = metadata.get_meta(m.resource_id).await.unwrap().unwrap();
    assert_eq!(stored.notes, "updated");
}

#[tokio::test]
async fn test_sweep_skips_rereferenced_content() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    let (r, m, e) = attach_rows(doc.document_id, "F", "a.md", b"revived");
    metadata.attach_resource(&r, &m, &e).await.unwrap();
    metadata.detach_resource(m.resource_id).await.unwrap();

    // Re-reference the content before the sweep runs
    let (_r2, m2, e2) = attach_rows(doc.document_id, "F", "b.md", b"revived");
    metadata.attach_resource(&r, &m2, &e2).await.unwrap();

    let future = OffsetDateTime::now_utc() + time::Duration::hours(1);
    let deleted = metadata
        .sweep_unreferenced_resources(future, 100)
        .await
        .unwrap();

    assert!(deleted.is_empty());
    assert!(
        metadata
            .get_resource(&r.content_hash)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_sweep_honors_limit_and_age() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    let doc = document_row(Uuid::new_v4());
    metadata.create_document(&doc).await.unwrap();

    for i in 0..3 {
        let bytes = format!("content-{i}");
        let (r, m, e) = attach_rows(doc.document_id, "F", "f.md", bytes.as_bytes());
        metadata.attach_resource(&r, &m, &e).await.unwrap();
        metadata.detach_resource(m.resource_id).await.unwrap();
    }

    // Nothing qualifies with a cutoff in the past
    let past = OffsetDateTime::now_utc() - time::Duration::hours(1);
    assert!(
        metadata
            .sweep_unreferenced_resources(past, 100)
            .await
            .unwrap()
            .is_empty()
    );

    // With a future cutoff, the limit caps the batch
    let future = OffsetDateTime::now_utc() + time::Duration::hours(1);
    assert_eq!(
        metadata
            .sweep_unreferenced_resources(future, 2)
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        metadata
            .sweep_unreferenced_resources(future, 2)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_bootstrap_session_id_roundtrip() {
    let server = TestServer::new().await;
    let metadata = server.metadata();

    assert!(metadata.get_bootstrap_session_id().await.unwrap().is_none());

    let id = Uuid::new_v4();
    metadata.set_bootstrap_session_id(id).await.unwrap();
    assert_eq!(metadata.get_bootstrap_session_id().await.unwrap(), Some(id));

    // Overwrite on rotation
    let next = Uuid::new_v4();
    metadata.set_bootstrap_session_id(next).await.unwrap();
    assert_eq!(
        metadata.get_bootstrap_session_id().await.unwrap(),
        Some(next)
    );
}
