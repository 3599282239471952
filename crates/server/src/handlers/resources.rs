//! Resource endpoints: upload, metadata, move, delete.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{
    load_document_authorized, parse_tags, read_json_body, tags_to_json,
};
use crate::metrics::{
    BYTES_DEDUPLICATED, BYTES_UPLOADED, RESOURCES_DEDUPLICATED, RESOURCES_UPLOADED,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use curiocity_core::document::{validate_folder_name, validate_tags};
use curiocity_core::hash::ContentHash;
use curiocity_core::resource::{
    AttachResourceResponse, MoveResourceRequest, UpdateResourceMetaRequest,
    file_type_from_content_type, object_key_for_hash, validate_resource_name,
};
use curiocity_core::session::Scope;
use curiocity_metadata::models::{FolderEntryRow, ResourceMetaRow, ResourceRow};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// File types whose bytes are retained as markdown/text content.
const TEXT_FILE_TYPES: &[&str] = &["md", "txt", "csv", "json", "html"];

/// Query parameters for resource upload.
#[derive(Debug, Deserialize)]
pub struct AttachQuery {
    /// Target folder; the configured default folder when absent.
    pub folder: Option<String>,
    /// Resource display name; "untitled" when absent.
    pub name: Option<String>,
}

/// Full metadata view of an attached resource.
#[derive(Debug, Serialize)]
pub struct ResourceMetaResponse {
    pub resource_id: String,
    pub document_id: String,
    pub content_hash: String,
    pub folder: String,
    pub name: String,
    pub file_type: String,
    pub notes: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub date_added: String,
    pub last_opened: Option<String>,
    pub updated_at: String,
}

fn meta_response(meta: &ResourceMetaRow, folder: &str) -> ApiResult<ResourceMetaResponse> {
    let format = |t: OffsetDateTime| {
        t.format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))
    };

    Ok(ResourceMetaResponse {
        resource_id: meta.resource_id.to_string(),
        document_id: meta.document_id.to_string(),
        content_hash: meta.content_hash.clone(),
        folder: folder.to_string(),
        name: meta.resource_name.clone(),
        file_type: meta.file_type.clone(),
        notes: meta.notes.clone(),
        summary: meta.summary.clone(),
        tags: parse_tags(&meta.tags),
        date_added: format(meta.date_added)?,
        last_opened: meta.last_opened.map(format).transpose()?,
        updated_at: format(meta.updated_at)?,
    })
}

/// Load a metadata record and authorize the caller against its document.
async fn load_meta_authorized(
    state: &AppState,
    req: Request,
    resource_id: Uuid,
    scope: Scope,
) -> ApiResult<ResourceMetaRow> {
    let auth = require_auth(&req)?;
    auth.require_scope(scope)?;

    let meta = state
        .metadata
        .get_meta(resource_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("resource {resource_id} not found")))?;

    load_document_authorized(state, auth, meta.document_id).await?;
    Ok(meta)
}

/// POST /v1/documents/{document_id}/resources - Attach an uploaded file.
///
/// The request body carries the raw file bytes; `Content-Type` supplies the
/// file type. Content is stored once per hash: a byte-identical upload under
/// any name reuses the existing content record and stored object.
#[tracing::instrument(skip(state, req), fields(content_hash))]
pub async fn attach_resource(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(query): Query<AttachQuery>,
    req: Request,
) -> ApiResult<(StatusCode, Json<AttachResourceResponse>)> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    load_document_authorized(&state, &auth, document_id).await?;

    let folder = match query.folder {
        Some(folder) => folder,
        None => state.config.server.default_folder.clone(),
    };
    validate_folder_name(&folder)?;

    let name = query.name.unwrap_or_else(|| "untitled".to_string());
    validate_resource_name(&name)?;

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let file_type = file_type_from_content_type(&content_type);

    let max_size = state.config.server.max_resource_size as usize;
    let bytes = axum::body::to_bytes(req.into_body(), max_size)
        .await
        .map_err(|_| {
            ApiError::PayloadTooLarge(format!("resource exceeds maximum size of {max_size} bytes"))
        })?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty upload body".to_string()));
    }

    // Step 1: the dedup key.
    let content_hash = ContentHash::compute(&bytes);
    tracing::Span::current().record("content_hash", content_hash.to_hex().as_str());

    // Step 2: at most one stored object per hash. Writing before the
    // metadata transaction means a failure below leaves an unreferenced
    // object at worst, which the sweep reclaims.
    let object_key = object_key_for_hash(&content_hash);
    let size_bytes = bytes.len() as u64;
    let markdown = if TEXT_FILE_TYPES.contains(&file_type.as_str()) {
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        String::new()
    };
    state
        .storage
        .put_if_not_exists(&object_key, bytes)
        .await?;

    // Steps 3-5 commit atomically in the metadata store.
    let now = OffsetDateTime::now_utc();
    let resource_id = Uuid::new_v4();
    let resource = ResourceRow {
        content_hash: content_hash.to_hex(),
        markdown,
        object_key,
        size_bytes: size_bytes as i64,
        refcount: 0,
        created_at: now,
        last_accessed_at: Some(now),
    };
    let meta = ResourceMetaRow {
        resource_id,
        document_id,
        content_hash: content_hash.to_hex(),
        resource_name: name.trim().to_string(),
        file_type: file_type.clone(),
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
        folder_name: folder.clone(),
        resource_name: meta.resource_name.clone(),
        file_type,
        date_added: now,
        last_opened: None,
    };

    let inserted = state
        .metadata
        .attach_resource(&resource, &meta, &entry)
        .await?;

    RESOURCES_UPLOADED.inc();
    if inserted {
        BYTES_UPLOADED.inc_by(size_bytes);
    } else {
        RESOURCES_DEDUPLICATED.inc();
        BYTES_DEDUPLICATED.inc_by(size_bytes);
    }

    tracing::info!(
        resource_id = %resource_id,
        document_id = %document_id,
        deduplicated = !inserted,
        "Resource attached"
    );

    Ok((
        StatusCode::CREATED,
        Json(AttachResourceResponse {
            resource_id: resource_id.to_string(),
            content_hash: content_hash.to_hex(),
            folder,
            deduplicated: !inserted,
        }),
    ))
}

/// GET /v1/resources/{resource_id} - Resource metadata. Marks the resource
/// as opened and refreshes the projection row.
pub async fn get_resource_meta(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<ResourceMetaResponse>> {
    let mut meta = load_meta_authorized(&state, req, resource_id, Scope::AccountRead).await?;

    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .touch_resource_opened(resource_id, now)
        .await?;
    meta.last_opened = Some(now);

    let entry = state
        .metadata
        .get_folder_entry(meta.document_id, resource_id)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "resource {resource_id} has no folder entry"
            ))
        })?;

    Ok(Json(meta_response(&meta, &entry.folder_name)?))
}

/// Resource content view.
#[derive(Debug, Serialize)]
pub struct ResourceContentResponse {
    pub content_hash: String,
    pub markdown: String,
    pub object_key: String,
    pub size_bytes: u64,
}

/// GET /v1/resources/{resource_id}/content - Extracted content and storage
/// location of the underlying content record.
pub async fn get_resource_content(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<ResourceContentResponse>> {
    let meta = load_meta_authorized(&state, req, resource_id, Scope::AccountRead).await?;

    let resource = state
        .metadata
        .get_resource(&meta.content_hash)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "content record missing for hash {}",
                meta.content_hash
            ))
        })?;

    Ok(Json(ResourceContentResponse {
        content_hash: resource.content_hash,
        markdown: resource.markdown,
        object_key: resource.object_key,
        size_bytes: resource.size_bytes as u64,
    }))
}

/// GET /v1/resources/{resource_id}/content/raw - The stored bytes.
pub async fn get_resource_content_raw(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let meta = load_meta_authorized(&state, req, resource_id, Scope::AccountRead).await?;

    let resource = state
        .metadata
        .get_resource(&meta.content_hash)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "content record missing for hash {}",
                meta.content_hash
            ))
        })?;

    let bytes = state.storage.get(&resource.object_key).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}

/// PATCH /v1/resources/{resource_id} - Update metadata fields.
pub async fn update_resource_meta(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<ResourceMetaResponse>> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;

    let mut meta = state
        .metadata
        .get_meta(resource_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("resource {resource_id} not found")))?;
    load_document_authorized(&state, &auth, meta.document_id).await?;

    let body: UpdateResourceMetaRequest = read_json_body(req).await?;

    if let Some(name) = body.name {
        validate_resource_name(&name)?;
        meta.resource_name = name.trim().to_string();
    }
    if let Some(notes) = body.notes {
        meta.notes = notes;
    }
    if let Some(summary) = body.summary {
        meta.summary = summary;
    }
    if let Some(tags) = body.tags {
        validate_tags(&tags)?;
        meta.tags = tags_to_json(&tags)?;
    }
    meta.updated_at = OffsetDateTime::now_utc();

    state.metadata.update_meta(&meta).await?;

    let entry = state
        .metadata
        .get_folder_entry(meta.document_id, resource_id)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(format!("resource {resource_id} has no folder entry"))
        })?;

    Ok(Json(meta_response(&meta, &entry.folder_name)?))
}

/// Move response.
#[derive(Debug, Serialize)]
pub struct MoveResourceResponse {
    pub resource_id: String,
    pub folder: String,
}

/// POST /v1/resources/{resource_id}/move - Move a resource to another folder.
pub async fn move_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<MoveResourceResponse>> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;

    let meta = state
        .metadata
        .get_meta(resource_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("resource {resource_id} not found")))?;
    load_document_authorized(&state, &auth, meta.document_id).await?;

    let body: MoveResourceRequest = read_json_body(req).await?;
    validate_folder_name(&body.folder)?;

    state
        .metadata
        .move_resource(
            meta.document_id,
            resource_id,
            &body.folder,
            OffsetDateTime::now_utc(),
        )
        .await?;

    Ok(Json(MoveResourceResponse {
        resource_id: resource_id.to_string(),
        folder: body.folder,
    }))
}

/// Deletion response.
#[derive(Debug, Serialize)]
pub struct DeleteResourceResponse {
    pub resource_id: String,
    pub content_hash: String,
    /// True when other metadata records still reference the content,
    /// so the content record and stored object were retained.
    pub content_retained: bool,
}

/// DELETE /v1/resources/{resource_id} - Detach a resource from its document.
///
/// The metadata record and folder entry are removed; the content record
/// survives while other metadata records reference it and is otherwise
/// reclaimed by the next sweep.
pub async fn delete_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<DeleteResourceResponse>> {
    load_meta_authorized(&state, req, resource_id, Scope::AccountWrite).await?;

    let content_hash = state.metadata.detach_resource(resource_id).await?;

    let content_retained = state
        .metadata
        .get_resource(&content_hash)
        .await?
        .map(|r| r.refcount > 0)
        .unwrap_or(false);

    tracing::info!(
        resource_id = %resource_id,
        content_hash = %content_hash,
        content_retained,
        "Resource detached"
    );

    Ok(Json(DeleteResourceResponse {
        resource_id: resource_id.to_string(),
        content_hash,
        content_retained,
    }))
}
