//! Admin endpoints: user listing, sweep, stats.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{SWEEP_BYTES_RECLAIMED, SWEEP_RESOURCES_DELETED};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use curiocity_core::session::Scope;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// User listing entry.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub created_at: String,
    pub last_logged_in: Option<String>,
}

/// GET /v1/admin/users - List all users.
pub async fn list_users(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<UserInfo>>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::Admin)?;

    let format = |t: OffsetDateTime| {
        t.format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))
    };

    let users = state.metadata.list_users().await?;
    let mut infos = Vec::with_capacity(users.len());
    for user in users {
        infos.push(UserInfo {
            user_id: user.user_id.to_string(),
            display_name: user.display_name,
            email: user.email,
            created_at: format(user.created_at)?,
            last_logged_in: user.last_logged_in.map(format).transpose()?,
        });
    }

    Ok(Json(infos))
}

/// Sweep response.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub resources_deleted: u64,
    pub bytes_reclaimed: u64,
    pub storage_errors: u64,
}

/// POST /v1/admin/sweep - Reclaim unreferenced content records.
///
/// Deletes refcount-0 content rows older than the configured grace period
/// from the metadata store (atomically, with a per-row refcount re-check),
/// then removes their objects from storage. Storage deletion failures are
/// counted but don't abort the sweep; the metadata rows are already gone,
/// so a retry would simply find nothing to re-delete and the object is
/// orphaned for operator cleanup.
#[tracing::instrument(skip(state, req))]
pub async fn run_sweep(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<SweepResponse>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::Admin)?;

    let grace = time::Duration::seconds(
        i64::try_from(state.config.sweep.grace_secs).unwrap_or(i64::MAX),
    );
    let older_than = OffsetDateTime::now_utc() - grace;

    let deleted = state
        .metadata
        .sweep_unreferenced_resources(older_than, state.config.sweep.batch_limit)
        .await?;

    let mut bytes_reclaimed = 0u64;
    let mut storage_errors = 0u64;
    for resource in &deleted {
        match state.storage.delete(&resource.object_key).await {
            Ok(()) => bytes_reclaimed += resource.size_bytes as u64,
            Err(curiocity_storage::StorageError::NotFound(_)) => {
                // Object already gone; nothing to reclaim.
            }
            Err(e) => {
                storage_errors += 1;
                tracing::error!(
                    object_key = %resource.object_key,
                    error = %e,
                    "Failed to delete swept object from storage"
                );
            }
        }
    }

    SWEEP_RESOURCES_DELETED.inc_by(deleted.len() as u64);
    SWEEP_BYTES_RECLAIMED.inc_by(bytes_reclaimed);

    tracing::info!(
        resources_deleted = deleted.len(),
        bytes_reclaimed,
        storage_errors,
        "Sweep completed"
    );

    Ok(Json(SweepResponse {
        resources_deleted: deleted.len() as u64,
        bytes_reclaimed,
        storage_errors,
    }))
}

/// Stats response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub resources_count: u64,
    pub resources_total_size: u64,
    pub resources_referenced: u64,
    pub resources_unreferenced: u64,
}

/// GET /v1/admin/stats - Content-record statistics.
pub async fn get_stats(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<StatsResponse>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::Admin)?;

    let stats = state.metadata.resource_stats().await?;

    Ok(Json(StatsResponse {
        resources_count: stats.count,
        resources_total_size: stats.total_size,
        resources_referenced: stats.referenced_count,
        resources_unreferenced: stats.unreferenced_count,
    }))
}
