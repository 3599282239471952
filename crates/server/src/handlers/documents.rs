//! Document and folder endpoints.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{load_document_authorized, parse_tags, read_json_body, tags_to_json};
use crate::metrics::DOCUMENTS_CREATED;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use curiocity_core::document::{
    CreateDocumentRequest, CreateFolderRequest, Document, DocumentId, Folder, RenameFolderRequest,
    ResourceCompressed, UpdateDocumentRequest, validate_document_name, validate_folder_name,
    validate_tags,
};
use curiocity_core::resource::ResourceId;
use curiocity_core::session::Scope;
use curiocity_metadata::models::{DocumentRow, FolderEntryRow, FolderRow};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Document listing entry: the document without its folder tree.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub date_added: String,
    pub last_opened: Option<String>,
    pub updated_at: String,
}

fn document_summary(row: &DocumentRow) -> ApiResult<DocumentSummary> {
    let format = |t: OffsetDateTime| {
        t.format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))
    };

    Ok(DocumentSummary {
        document_id: row.document_id.to_string(),
        name: row.name.clone(),
        tags: parse_tags(&row.tags),
        date_added: format(row.date_added)?,
        last_opened: row.last_opened.map(format).transpose()?,
        updated_at: format(row.updated_at)?,
    })
}

/// Assemble the full document view from its rows. Folders carry their
/// entries in attach order; folders without resources still appear.
fn document_view(
    row: &DocumentRow,
    folders: Vec<FolderRow>,
    entries: Vec<FolderEntryRow>,
) -> ApiResult<Document> {
    let mut view_folders: Vec<Folder> = folders
        .into_iter()
        .map(|f| Folder {
            name: f.folder_name,
            resources: Vec::new(),
        })
        .collect();

    for entry in entries {
        let projection = ResourceCompressed {
            resource_id: ResourceId::parse(&entry.resource_id.to_string())?,
            name: entry.resource_name,
            file_type: entry.file_type,
            date_added: entry.date_added,
            last_opened: entry.last_opened,
        };
        match view_folders
            .iter_mut()
            .find(|f| f.name == entry.folder_name)
        {
            Some(folder) => folder.resources.push(projection),
            None => {
                // Entry referencing a folder row we didn't load; the
                // transactional writes should make this unreachable.
                tracing::warn!(
                    document_id = %row.document_id,
                    folder = %entry.folder_name,
                    "folder entry without folder row"
                );
            }
        }
    }

    Ok(Document {
        id: DocumentId::parse(&row.document_id.to_string())?,
        owner_id: row.owner_id,
        name: row.name.clone(),
        text: row.text.clone(),
        folders: view_folders,
        tags: parse_tags(&row.tags),
        date_added: row.date_added,
        last_opened: row.last_opened,
        updated_at: row.updated_at,
    })
}

/// POST /v1/documents - Create a document.
#[tracing::instrument(skip(state, req))]
pub async fn create_document(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<DocumentSummary>)> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    let owner_id = auth.require_user_id()?;

    let body: CreateDocumentRequest = read_json_body(req).await?;

    validate_document_name(&body.name)?;
    let tags = body.tags.unwrap_or_default();
    validate_tags(&tags)?;

    let now = OffsetDateTime::now_utc();
    let document = DocumentRow {
        document_id: Uuid::new_v4(),
        owner_id,
        name: body.name.trim().to_string(),
        text: body.text.unwrap_or_default(),
        tags: tags_to_json(&tags)?,
        date_added: now,
        last_opened: None,
        updated_at: now,
    };

    state.metadata.create_document(&document).await?;
    DOCUMENTS_CREATED.inc();

    tracing::info!(document_id = %document.document_id, "Document created");

    Ok((StatusCode::CREATED, Json(document_summary(&document)?)))
}

/// GET /v1/documents - List the caller's documents, most recently opened first.
pub async fn list_documents(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<DocumentSummary>>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::AccountRead)?;
    let owner_id = auth.require_user_id()?;

    let rows = state.metadata.list_documents_for_owner(owner_id).await?;
    let summaries = rows
        .iter()
        .map(document_summary)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(summaries))
}

/// GET /v1/documents/{document_id} - Full document view with folders.
/// Marks the document as opened.
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<Document>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::AccountRead)?;
    let mut document = load_document_authorized(&state, auth, document_id).await?;

    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .touch_document_opened(document_id, now)
        .await?;
    document.last_opened = Some(now);

    let folders = state.metadata.list_folders(document_id).await?;
    let entries = state.metadata.list_folder_entries(document_id).await?;

    Ok(Json(document_view(&document, folders, entries)?))
}

/// PATCH /v1/documents/{document_id} - Update name, text, or tags.
pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<DocumentSummary>> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    let mut document = load_document_authorized(&state, &auth, document_id).await?;

    let body: UpdateDocumentRequest = read_json_body(req).await?;

    if let Some(name) = body.name {
        validate_document_name(&name)?;
        document.name = name.trim().to_string();
    }
    if let Some(text) = body.text {
        document.text = text;
    }
    if let Some(tags) = body.tags {
        validate_tags(&tags)?;
        document.tags = tags_to_json(&tags)?;
    }
    document.updated_at = OffsetDateTime::now_utc();

    state.metadata.update_document(&document).await?;

    Ok(Json(document_summary(&document)?))
}

/// Document deletion response.
#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: String,
    pub resources_detached: u64,
}

/// DELETE /v1/documents/{document_id} - Delete a document and its resources.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<DeleteDocumentResponse>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::AccountWrite)?;
    load_document_authorized(&state, auth, document_id).await?;

    let resources_detached = state.metadata.delete_document(document_id).await?;

    tracing::info!(
        document_id = %document_id,
        resources_detached,
        "Document deleted"
    );

    Ok(Json(DeleteDocumentResponse {
        document_id: document_id.to_string(),
        resources_detached,
    }))
}

/// Folder view response.
#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub document_id: String,
    pub name: String,
}

/// PUT /v1/documents/{document_id}/folders - Create a folder explicitly.
pub async fn create_folder(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    req: Request,
) -> ApiResult<(StatusCode, Json<FolderResponse>)> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    load_document_authorized(&state, &auth, document_id).await?;

    let body: CreateFolderRequest = read_json_body(req).await?;
    validate_folder_name(&body.name)?;

    let folder = FolderRow {
        document_id,
        folder_name: body.name.clone(),
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_folder(&folder).await?;

    Ok((
        StatusCode::CREATED,
        Json(FolderResponse {
            document_id: document_id.to_string(),
            name: body.name,
        }),
    ))
}

/// PATCH /v1/documents/{document_id}/folders/{folder_name} - Rename a folder.
pub async fn rename_folder(
    State(state): State<AppState>,
    Path((document_id, folder_name)): Path<(Uuid, String)>,
    req: Request,
) -> ApiResult<Json<FolderResponse>> {
    let auth = require_auth(&req)?.clone();
    auth.require_scope(Scope::AccountWrite)?;
    load_document_authorized(&state, &auth, document_id).await?;

    let body: RenameFolderRequest = read_json_body(req).await?;
    validate_folder_name(&body.new_name)?;

    state
        .metadata
        .rename_folder(
            document_id,
            &folder_name,
            &body.new_name,
            OffsetDateTime::now_utc(),
        )
        .await?;

    Ok(Json(FolderResponse {
        document_id: document_id.to_string(),
        name: body.new_name,
    }))
}

/// Folder deletion response.
#[derive(Debug, Serialize)]
pub struct DeleteFolderResponse {
    pub document_id: String,
    pub name: String,
    pub resources_detached: u64,
}

/// DELETE /v1/documents/{document_id}/folders/{folder_name} - Delete a folder
/// and every resource filed in it.
pub async fn delete_folder(
    State(state): State<AppState>,
    Path((document_id, folder_name)): Path<(Uuid, String)>,
    req: Request,
) -> ApiResult<Json<DeleteFolderResponse>> {
    let auth = require_auth(&req)?;
    auth.require_scope(Scope::AccountWrite)?;
    load_document_authorized(&state, auth, document_id).await?;

    let resources_detached = state
        .metadata
        .delete_folder(document_id, &folder_name)
        .await?;

    Ok(Json(DeleteFolderResponse {
        document_id: document_id.to_string(),
        name: folder_name,
        resources_detached,
    }))
}
