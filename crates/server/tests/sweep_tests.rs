//! Integration tests for the unreferenced-content sweep.

mod common;

use axum::http::StatusCode;
use common::{TestServer, create_admin_token, json_request, raw_request, signup_user};
use curiocity_core::config::AppConfig;
use serde_json::json;

/// Server with a zero grace period so freshly-detached content is sweepable.
async fn sweep_server() -> TestServer {
    let mut config = AppConfig::for_testing();
    config.sweep.grace_secs = 0;
    TestServer::with_config(config).await
}

async fn setup_resource(server: &TestServer, token: &str) -> (String, String) {
    let (_, body) = json_request(
        &server.router,
        "POST",
        "/v1/documents",
        Some(json!({"name": "Doc"})),
        Some(token),
    )
    .await;
    let doc_id = body["document_id"].as_str().unwrap().to_string();

    let (status, body) = raw_request(
        &server.router,
        "POST",
        &format!("/v1/documents/{doc_id}/resources?name=file.md"),
        b"sweepable bytes".to_vec(),
        "text/markdown",
        token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        body["resource_id"].as_str().unwrap().to_string(),
        body["content_hash"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_sweep_reclaims_unreferenced_content() {
    let server = sweep_server().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let admin = create_admin_token(&server).await;

    let (resource_id, hash) = setup_resource(&server, &token).await;

    // Detach the only reference
    json_request(
        &server.router,
        "DELETE",
        &format!("/v1/resources/{resource_id}"),
        None,
        Some(&token),
    )
    .await;

    let object_key = server
        .metadata()
        .get_resource(&hash)
        .await
        .unwrap()
        .unwrap()
        .object_key;
    assert!(server.storage().exists(&object_key).await.unwrap());

    // Give the zero grace period a moment to elapse
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (status, body) =
        json_request(&server.router, "POST", "/v1/admin/sweep", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources_deleted"], 1);
    assert_eq!(body["bytes_reclaimed"], 15);
    assert_eq!(body["storage_errors"], 0);

    // Metadata row and stored object are both gone
    assert!(server.metadata().get_resource(&hash).await.unwrap().is_none());
    assert!(!server.storage().exists(&object_key).await.unwrap());
}

#[tokio::test]
async fn test_sweep_leaves_referenced_content() {
    let server = sweep_server().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let admin = create_admin_token(&server).await;

    let (_resource_id, hash) = setup_resource(&server, &token).await;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (status, body) =
        json_request(&server.router, "POST", "/v1/admin/sweep", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources_deleted"], 0);

    assert!(server.metadata().get_resource(&hash).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sweep_respects_grace_period() {
    // Default config: one-hour grace, so nothing is old enough to sweep
    let server = TestServer::new().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let admin = create_admin_token(&server).await;

    let (resource_id, hash) = setup_resource(&server, &token).await;
    json_request(
        &server.router,
        "DELETE",
        &format!("/v1/resources/{resource_id}"),
        None,
        Some(&token),
    )
    .await;

    let (status, body) =
        json_request(&server.router, "POST", "/v1/admin/sweep", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources_deleted"], 0);
    assert!(server.metadata().get_resource(&hash).await.unwrap().is_some());
}

#[tokio::test]
async fn test_stats_track_referenced_and_unreferenced() {
    let server = sweep_server().await;
    let (_, token) = signup_user(&server, "Ada", "ada@example.com").await;
    let admin = create_admin_token(&server).await;

    let (resource_id, _) = setup_resource(&server, &token).await;

    let (_, stats) =
        json_request(&server.router, "GET", "/v1/admin/stats", None, Some(&admin)).await;
    assert_eq!(stats["resources_count"], 1);
    assert_eq!(stats["resources_referenced"], 1);
    assert_eq!(stats["resources_unreferenced"], 0);

    json_request(
        &server.router,
        "DELETE",
        &format!("/v1/resources/{resource_id}"),
        None,
        Some(&token),
    )
    .await;

    let (_, stats) =
        json_request(&server.router, "GET", "/v1/admin/stats", None, Some(&admin)).await;
    assert_eq!(stats["resources_referenced"], 0);
    assert_eq!(stats["resources_unreferenced"], 1);
}
