//! Integration tests for the resource attach/move/delete flow and the
//! content-hash dedup invariant.

mod common;

use axum::http::StatusCode;
use common::{TestServer, json_request, raw_request, signup_user};
use serde_json::json;

async fn create_document(server: &TestServer, token: &str, name: &str) -> String {
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/documents",
        Some(json!({"name": name})),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["document_id"].as_str().unwrap().to_string()
}

async fn upload(
    server: &TestServer,
    token: &str,
    doc_id: &str,
    folder: &str,
    name: &str,
    bytes: &[u8],
) -> serde_json::Value {
    let (status, body) = raw_request(
        &server.router,
        "POST",
        &format!("/v1/documents/{doc_id}/resources?folder={folder}&name={name}"),
        bytes.to_vec(),
        "text/markdown",
        token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
    body
}

#[tokio::test]
async fn test_attach_creates_meta_folder_and_content() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let body = upload(&server, &token, &doc_id, "Research", "notes.md", b"# Notes").await;
    assert_eq!(body["deduplicated"], false);
    assert_eq!(body["folder"], "Research");
    let resource_id = body["resource_id"].as_str().unwrap();

    // Visible in the document's folder listing...
    let (_, doc) = json_request(
        &server.router,
        "GET",
        &format!("/v1/documents/{doc_id}"),
        None,
        Some(&token),
    )
    .await;
    let folder = &doc["folders"][0];
    assert_eq!(folder["name"], "Research");
    assert_eq!(folder["resources"][0]["resource_id"], resource_id);
    assert_eq!(folder["resources"][0]["name"], "notes.md");
    assert_eq!(folder["resources"][0]["file_type"], "md");

    // ...and via direct metadata lookup by id
    let (status, meta) = json_request(
        &server.router,
        "GET",
        &format!("/v1/resources/{resource_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["document_id"], doc_id);
    assert_eq!(meta["folder"], "Research");
    assert_eq!(meta["name"], "notes.md");

    // Content record holds the markdown and stored size
    let (_, content) = json_request(
        &server.router,
        "GET",
        &format!("/v1/resources/{resource_id}/content"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(content["markdown"], "# Notes");
    assert_eq!(content["size_bytes"], 7);
}

#[tokio::test]
async fn test_dedup_byte_identical_uploads_share_content() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_a = create_document(&server, &token, "A").await;
    let doc_b = create_document(&server, &token, "B").await;

    // Byte-identical files under different names, in different documents
    let first = upload(&server, &token, &doc_a, "General", "report.md", b"same bytes").await;
    let second = upload(&server, &token, &doc_a, "General", "copy.md", b"same bytes").await;
    let third = upload(&server, &token, &doc_b, "Inbox", "again.md", b"same bytes").await;

    assert_eq!(first["deduplicated"], false);
    assert_eq!(second["deduplicated"], true);
    assert_eq!(third["deduplicated"], true);

    let hash = first["content_hash"].as_str().unwrap();
    assert_eq!(second["content_hash"], hash);
    assert_eq!(third["content_hash"], hash);

    // Exactly one content record exists for the hash, referenced three times
    let resource = server.metadata().get_resource(hash).await.unwrap().unwrap();
    assert_eq!(resource.refcount, 3);
    assert_eq!(server.metadata().count_metas_for_hash(hash).await.unwrap(), 3);

    // And exactly one stored object
    let keys = server.storage().list("resources/").await.unwrap();
    assert_eq!(keys.len(), 1);
}

#[tokio::test]
async fn test_different_bytes_do_not_dedup() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let first = upload(&server, &token, &doc_id, "General", "a.md", b"alpha").await;
    let second = upload(&server, &token, &doc_id, "General", "b.md", b"beta").await;

    assert_eq!(second["deduplicated"], false);
    assert_ne!(first["content_hash"], second["content_hash"]);
}

#[tokio::test]
async fn test_move_between_folders_no_duplication_no_loss() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let body = upload(&server, &token, &doc_id, "Source", "file.md", b"contents").await;
    let resource_id = body["resource_id"].as_str().unwrap().to_string();

    // Repeated moves, including a no-op move to the current folder
    for target in ["Target", "Target", "Source", "Target"] {
        let (status, body) = json_request(
            &server.router,
            "POST",
            &format!("/v1/resources/{resource_id}/move"),
            Some(json!({"folder": target})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "move failed: {body}");
    }

    let (_, doc) = json_request(
        &server.router,
        "GET",
        &format!("/v1/documents/{doc_id}"),
        None,
        Some(&token),
    )
    .await;

    // The entry appears exactly once, in the final target folder
    let mut seen = 0;
    for folder in doc["folders"].as_array().unwrap() {
        for resource in folder["resources"].as_array().unwrap() {
            if resource["resource_id"] == resource_id.as_str() {
                seen += 1;
                assert_eq!(folder["name"], "Target");
            }
        }
    }
    assert_eq!(seen, 1);
}

#[tokio::test]
async fn test_delete_resource_retains_shared_content() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let first = upload(&server, &token, &doc_id, "General", "one.md", b"shared").await;
    let second = upload(&server, &token, &doc_id, "General", "two.md", b"shared").await;
    let hash = first["content_hash"].as_str().unwrap().to_string();

    // Delete one of the two references: content survives
    let first_id = first["resource_id"].as_str().unwrap();
    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/v1/resources/{first_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_retained"], true);

    let resource = server.metadata().get_resource(&hash).await.unwrap().unwrap();
    assert_eq!(resource.refcount, 1);

    // The deleted meta is gone; the surviving one still resolves
    let (status, _) = json_request(
        &server.router,
        "GET",
        &format!("/v1/resources/{first_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let second_id = second["resource_id"].as_str().unwrap();
    let (status, _) = json_request(
        &server.router,
        "GET",
        &format!("/v1/resources/{second_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Delete the last reference: content row remains with refcount 0
    // until the sweep reclaims it
    let (_, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/v1/resources/{second_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(body["content_retained"], false);

    let resource = server.metadata().get_resource(&hash).await.unwrap().unwrap();
    assert_eq!(resource.refcount, 0);
    assert!(server.storage().exists(&resource.object_key).await.unwrap());
}

#[tokio::test]
async fn test_delete_removes_from_folder_listing() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let body = upload(&server, &token, &doc_id, "General", "gone.md", b"bytes").await;
    let resource_id = body["resource_id"].as_str().unwrap();

    json_request(
        &server.router,
        "DELETE",
        &format!("/v1/resources/{resource_id}"),
        None,
        Some(&token),
    )
    .await;

    let (_, doc) = json_request(
        &server.router,
        "GET",
        &format!("/v1/documents/{doc_id}"),
        None,
        Some(&token),
    )
    .await;
    // The folder survives, empty
    assert_eq!(doc["folders"][0]["name"], "General");
    assert_eq!(doc["folders"][0]["resources"], json!([]));
}

#[tokio::test]
async fn test_update_meta_refreshes_projection() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let body = upload(&server, &token, &doc_id, "General", "old-name.md", b"x").await;
    let resource_id = body["resource_id"].as_str().unwrap();

    let (status, meta) = json_request(
        &server.router,
        "PATCH",
        &format!("/v1/resources/{resource_id}"),
        Some(json!({
            "name": "new-name.md",
            "notes": "checked sources",
            "tags": ["reviewed"],
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["name"], "new-name.md");
    assert_eq!(meta["notes"], "checked sources");
    assert_eq!(meta["tags"], json!(["reviewed"]));

    // The folder projection shows the new name without a meta fetch
    let (_, doc) = json_request(
        &server.router,
        "GET",
        &format!("/v1/documents/{doc_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(doc["folders"][0]["resources"][0]["name"], "new-name.md");
}

#[tokio::test]
async fn test_upload_to_foreign_document_forbidden() {
    let server = TestServer::new().await;
    let (_, ada) = signup_user(&server, "Ada", "ada@example.com").await;
    let (_, eve) = signup_user(&server, "Eve", "eve@example.com").await;
    let doc_id = create_document(&server, &ada, "Private").await;

    let (status, _) = raw_request(
        &server.router,
        "POST",
        &format!("/v1/documents/{doc_id}/resources?name=sneak.md"),
        b"intrusion".to_vec(),
        "text/markdown",
        &eve,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upload_empty_body_rejected() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let (status, _) = raw_request(
        &server.router,
        "POST",
        &format!("/v1/documents/{doc_id}/resources"),
        Vec::new(),
        "text/plain",
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_uses_default_folder() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let (status, body) = raw_request(
        &server.router,
        "POST",
        &format!("/v1/documents/{doc_id}/resources?name=x.txt"),
        b"abc".to_vec(),
        "text/plain",
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["folder"], "General");
}

#[tokio::test]
async fn test_raw_content_roundtrip() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let payload = b"\x00\x01binary payload\xff";
    let (status, body) = raw_request(
        &server.router,
        "POST",
        &format!("/v1/documents/{doc_id}/resources?name=blob.bin"),
        payload.to_vec(),
        "application/octet-stream",
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let resource_id = body["resource_id"].as_str().unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/resources/{resource_id}/content/raw"))
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], payload);
}

#[tokio::test]
async fn test_delete_folder_detaches_resources() {
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let doc_id = create_document(&server, &token, "Doc").await;

    let kept = upload(&server, &token, &doc_id, "Keep", "kept.md", b"kept").await;
    upload(&server, &token, &doc_id, "Drop", "a.md", b"aaa").await;
    upload(&server, &token, &doc_id, "Drop", "b.md", b"bbb").await;

    let (status, body) = json_request(
        &server.router,
        "DELETE",
        &format!("/v1/documents/{doc_id}/folders/Drop"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources_detached"], 2);

    // The kept folder and its resource are untouched
    let kept_id = kept["resource_id"].as_str().unwrap();
    let (status, _) = json_request(
        &server.router,
        "GET",
        &format!("/v1/resources/{kept_id}"),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
