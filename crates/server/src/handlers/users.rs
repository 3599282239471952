//! User account endpoints.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::read_json_body;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use curiocity_core::session::Scope;
use curiocity_core::user::{UpdateUserRequest, validate_display_name};
use curiocity_metadata::models::UserRow;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// User account view.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_logged_in: Option<String>,
}

fn user_response(user: &UserRow) -> ApiResult<UserResponse> {
    let format = |t: OffsetDateTime| {
        t.format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))
    };

    Ok(UserResponse {
        user_id: user.user_id.to_string(),
        display_name: user.display_name.clone(),
        email: user.email.clone(),
        profile_image: user.profile_image.clone(),
        created_at: format(user.created_at)?,
        updated_at: format(user.updated_at)?,
        last_logged_in: user.last_logged_in.map(format).transpose()?,
    })
}

/// Load the caller's own user record.
async fn load_self(state: &AppState, req: Request) -> ApiResult<UserRow> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::AccountRead)?;
    let user_id = auth.require_user_id()?;

    state
        .metadata
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))
}

/// GET /v1/users/me - Get the caller's account.
pub async fn get_me(State(state): State<AppState>, req: Request) -> ApiResult<Json<UserResponse>> {
    let user = load_self(&state, req).await?;
    Ok(Json(user_response(&user)?))
}

/// PATCH /v1/users/me - Update the caller's account.
pub async fn update_me(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<UserResponse>> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    let user_id = auth.require_user_id()?;

    let body: UpdateUserRequest = read_json_body(req).await?;

    let mut user = state
        .metadata
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;

    if let Some(display_name) = body.display_name {
        validate_display_name(&display_name)?;
        user.display_name = display_name.trim().to_string();
    }
    if let Some(profile_image) = body.profile_image {
        user.profile_image = if profile_image.is_empty() {
            None
        } else {
            Some(profile_image)
        };
    }
    user.updated_at = OffsetDateTime::now_utc();

    state.metadata.update_user(&user).await?;

    Ok(Json(user_response(&user)?))
}

/// Account deletion response.
#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub documents_deleted: u64,
    pub resources_detached: u64,
    pub sessions_deleted: u64,
}

/// DELETE /v1/users/me - Delete the caller's account and all owned data.
///
/// Each document is removed in its own transaction; content refcounts are
/// decremented and the sweep reclaims anything left unreferenced.
pub async fn delete_me(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<DeleteAccountResponse>> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    let user_id = auth.require_user_id()?;

    let user = state
        .metadata
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;

    let documents = state.metadata.list_documents_for_owner(user_id).await?;
    let mut documents_deleted = 0u64;
    let mut resources_detached = 0u64;
    for document in &documents {
        resources_detached += state.metadata.delete_document(document.document_id).await?;
        documents_deleted += 1;
    }

    state.metadata.delete_credential(&user.email).await?;
    let sessions_deleted = state.metadata.delete_sessions_for_user(user_id).await?;
    state.metadata.delete_user(user_id).await?;

    tracing::info!(
        user_id = %user_id,
        documents_deleted,
        resources_detached,
        "Account deleted"
    );

    Ok(Json(DeleteAccountResponse {
        documents_deleted,
        resources_detached,
        sessions_deleted,
    }))
}
