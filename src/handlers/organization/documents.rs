use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    handler::Handler,
    http::{header::CONTENT_LENGTH, HeaderMap},
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Document, NewDocument};
use crate::database::repository::DocumentRepository;
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult};
use crate::services::storage::{check_declared_length, check_mime_type, max_upload_body_bytes, SizeGuard};
use crate::services::{FileCategory, Upload};
use crate::types::{ListQuery, Page};

const MAX_TITLE_CHARS: usize = 200;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list).post(upload.layer(DefaultBodyLimit::max(max_upload_body_bytes()))))
        .route("/documents/:id", get(show).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UploadQuery {
    pub category: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    tracing::debug!("Multipart read failed: {}", err);
    ApiError::bad_request(err.body_text())
}

pub async fn list(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Document>> {
    ctx.require(Capability::ViewContent)?;
    let window = query.window(&state.config.api);

    let (documents, total) = state
        .store
        .list_documents(ctx.organization_id(), window.limit(), window.offset())
        .await?;
    Ok(ApiResponse::success(Page::new(documents, window, total)))
}

pub async fn show(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Document> {
    ctx.require(Capability::ViewContent)?;
    let document = ctx.scoped(state.store.find_document(id).await?)?;
    Ok(ApiResponse::success(document))
}

/// POST /organization/documents?category=<category>
///
/// Multipart form with a `file` part and an optional `title`. The declared length is
/// checked against the category ceiling before reading, and the running byte count
/// while streaming, so oversized uploads stop early.
pub async fn upload(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Document> {
    ctx.require(Capability::ManageDocuments)?;

    let category: FileCategory = query
        .category
        .as_deref()
        .ok_or_else(|| ApiError::field("category", "The category field is required."))?
        .parse()?;

    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    check_declared_length(category, declared)?;

    let mut title: Option<String> = None;
    let mut upload: Option<Upload> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                check_mime_type(category, &mime_type)?;

                let mut guard = SizeGuard::new(category);
                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    guard.accept(chunk.len())?;
                    data.extend_from_slice(&chunk);
                }
                tracing::debug!("Received {} bytes of {} for '{}'", guard.received(), category, original_name);

                upload = Some(Upload { original_name, mime_type, data });
            }
            Some("title") => {
                title = Some(field.text().await.map_err(multipart_error)?);
            }
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    let upload = upload.ok_or_else(|| ApiError::field("file", "The file field is required."))?;
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| upload.original_name.clone());
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::field("title", "The title may not be greater than 200 characters."));
    }

    let stored = state.storage.store(category, upload).await?;

    let created = state
        .store
        .create_document(&NewDocument {
            organization_id: ctx.organization_id(),
            title,
            category,
            path: stored.path.clone(),
            url: stored.url,
            size_bytes: stored.size,
            mime_type: stored.mime_type,
            original_name: stored.name,
        })
        .await;

    let document = match created {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.storage.remove(&stored.path).await {
                tracing::warn!("Could not remove orphaned upload {}: {}", stored.path, cleanup);
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        "Document {} ({}, {} bytes) uploaded to organization {}",
        document.uuid,
        document.category,
        document.size_bytes,
        ctx.organization_id()
    );
    Ok(ApiResponse::created(document).with_message("Document uploaded"))
}

/// Refused while chapters reference the document; the stored file goes after the row
pub async fn destroy(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    let document = ctx.authorize(Capability::ManageDocuments, state.store.find_document(id).await?)?;

    let count = state.store.count_document_references(document.id).await?;
    if count > 0 {
        return Err(ApiError::conflict_with_count(
            "Document is still referenced by chapters and cannot be deleted",
            count,
        ));
    }

    state.store.delete_document(document.id).await?;
    if let Err(e) = state.storage.remove(&document.path).await {
        tracing::warn!("Document {} deleted but file {} was not removed: {}", document.uuid, document.path, e);
    }

    Ok(ApiResponse::message("Document deleted"))
}
