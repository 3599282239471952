//! Shared handler helpers.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use curiocity_metadata::models::DocumentRow;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Maximum request body size for JSON endpoints (1 MiB).
pub const MAX_JSON_BODY_SIZE: usize = 1024 * 1024;

/// Read and deserialize a JSON request body with a size cap.
pub async fn read_json_body<T: DeserializeOwned>(req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Check that the caller may access a document.
/// Admin sessions may access any document; everyone else only their own.
pub fn authorize_document(auth: &AuthenticatedUser, document: &DocumentRow) -> ApiResult<()> {
    if auth.session.is_admin() {
        return Ok(());
    }
    match auth.session.user_id {
        Some(user_id) if user_id == document.owner_id => Ok(()),
        _ => Err(ApiError::Forbidden(
            "not the owner of this document".to_string(),
        )),
    }
}

/// Load a document and verify the caller may access it.
pub async fn load_document_authorized(
    state: &AppState,
    auth: &AuthenticatedUser,
    document_id: Uuid,
) -> ApiResult<DocumentRow> {
    let document = state
        .metadata
        .get_document(document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("document {document_id} not found")))?;
    authorize_document(auth, &document)?;
    Ok(document)
}

/// Parse a JSON tag column. Corrupt values decode to an empty list
/// rather than failing the whole read.
pub fn parse_tags(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Serialize tags for storage.
pub fn tags_to_json(tags: &[String]) -> ApiResult<String> {
    serde_json::to_string(tags)
        .map_err(|e| ApiError::Internal(format!("failed to serialize tags: {e}")))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /v1/health - Health check.
///
/// This endpoint is intentionally unauthenticated to support:
/// - Kubernetes liveness/readiness probes
/// - Load balancer health checks
/// - Monitoring systems
///
/// Returns only non-sensitive information (status and version).
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    // Check metadata store and storage backend connectivity
    state.metadata.health_check().await?;
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
