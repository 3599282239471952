//! Capability discovery endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Capabilities response.
#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    /// Maximum resource upload size in bytes.
    pub max_resource_size: u64,
    /// Folder used when an upload names none.
    pub default_folder: String,
    /// Storage backend identifier.
    pub storage_backend: &'static str,
    /// Whether byte-identical uploads are deduplicated.
    pub supports_dedup: bool,
    /// API version.
    pub api_version: &'static str,
}

/// GET /v1/capabilities
pub async fn get_capabilities(
    State(state): State<AppState>,
) -> ApiResult<Json<CapabilitiesResponse>> {
    Ok(Json(CapabilitiesResponse {
        max_resource_size: state.config.server.max_resource_size,
        default_folder: state.config.server.default_folder.clone(),
        storage_backend: state.storage.backend_name(),
        supports_dedup: true,
        api_version: "v1",
    }))
}
