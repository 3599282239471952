//! Server test utilities.

use curiocity_core::config::AppConfig;
use curiocity_metadata::models::SessionRow;
use curiocity_metadata::{MetadataStore, SqliteStore};
use curiocity_server::{AppState, create_router};
use curiocity_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_testing()).await
    }

    /// Create a new test server with a custom configuration.
    /// Storage and metadata paths in the config are ignored; temporary
    /// directories are always used.
    pub async fn with_config(config: AppConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        // Create storage
        let storage_path = temp_dir.path().join("storage");
        std::fs::create_dir_all(&storage_path).expect("Failed to create storage directory");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        // Create metadata
        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );

        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get the metadata store.
    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.state.metadata
    }

    /// Get the storage backend.
    pub fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.state.storage
    }
}

/// Make a JSON request against the router and decode the response body.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    auth_token: Option<&str>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: serde_json::Value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, body_json)
}

/// Make a raw-body request (resource uploads) and decode the JSON response.
#[allow(dead_code)]
pub async fn raw_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Vec<u8>,
    content_type: &str,
    auth_token: &str,
) -> (axum::http::StatusCode, serde_json::Value) {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", auth_token))
        .header("Content-Type", content_type)
        .body(Body::from(body))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: serde_json::Value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, body_json)
}

/// Sign up a user through the API and return (user_id, bearer token).
#[allow(dead_code)]
pub async fn signup_user(server: &TestServer, name: &str, email: &str) -> (String, String) {
    let (status, body) = json_request(
        &server.router,
        "POST",
        "/v1/auth/signup",
        Some(serde_json::json!({
            "display_name": name,
            "email": email,
            "password": "correct-horse-battery",
        })),
        None,
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::CREATED, "signup failed: {body}");

    (
        body["user_id"].as_str().unwrap().to_string(),
        body["token_secret"].as_str().unwrap().to_string(),
    )
}

/// Insert an admin session directly and return its bearer token.
#[allow(dead_code)]
pub async fn create_admin_token(server: &TestServer) -> String {
    use super::fixtures::sha256_hash;

    let raw_token = format!("test-admin-{}", Uuid::new_v4());
    let session = SessionRow {
        session_id: Uuid::new_v4(),
        user_id: None,
        token_hash: sha256_hash(raw_token.as_bytes()),
        scopes: r#"["admin"]"#.to_string(),
        expires_at: None,
        revoked_at: None,
        created_at: OffsetDateTime::now_utc(),
        last_used_at: None,
        description: Some("Test admin token".to_string()),
    };

    server
        .metadata()
        .create_session(&session)
        .await
        .expect("Failed to create admin session");

    raw_token
}
