//! services/api/src/web/pages.rs
//!
//! The journal gallery endpoints (list, delete, HTML export), the save
//! pipeline shared with the canvas layer, and the master definition for the
//! OpenAPI specification.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::adapters::PageCache;
use crate::web::state::AppState;
use visual_journal_core::domain::{data_url_mime, is_inline_data_url, ItemType, JournalPage};
use visual_journal_core::export::{export_filename, render_page_html};
use visual_journal_core::ports::{FileStore, PortError, PortResult};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_pages_handler,
        delete_page_handler,
        export_page_html_handler,
        crate::web::auth::anonymous_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::canvas::open_canvas_handler,
        crate::web::canvas::save_canvas_handler,
    ),
    components(
        schemas(
            visual_journal_core::domain::JournalPage,
            visual_journal_core::domain::CanvasItem,
            visual_journal_core::domain::ItemType,
            visual_journal_core::domain::Position,
            visual_journal_core::domain::Size,
            crate::web::auth::AuthResponse,
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::canvas::OpenCanvasRequest,
            crate::web::canvas::SaveResponse,
        )
    ),
    tags(
        (name = "Visual Journal API", description = "API endpoints for the freeform canvas journal.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Media Payload Helpers
//=========================================================================================

/// Inline-encodes a media payload the way items hold it before upload.
pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Splits an inline `data:` URL back into its MIME type and raw bytes.
pub fn decode_data_url(data_url: &str) -> PortResult<(String, Vec<u8>)> {
    let mime = data_url_mime(data_url)
        .ok_or_else(|| PortError::Unexpected("Malformed data URL".to_string()))?
        .to_string();
    let payload = data_url
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or_else(|| PortError::Unexpected("Malformed data URL".to_string()))?;
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| PortError::Unexpected(format!("Malformed data URL payload: {}", e)))?;
    Ok((mime, bytes))
}

async fn upload_data_url(files: &dyn FileStore, data_url: &str) -> PortResult<String> {
    let (mime, bytes) = decode_data_url(data_url)?;
    Ok(files.put(&bytes, &mime).await?.url)
}

/// The upload-then-URL-substitution step of the save pipeline: any item
/// content or attached audio that is still inline-encoded is uploaded and
/// replaced with the returned storage URL. Content that is already a stored
/// reference is never re-uploaded. An item upload failure aborts the save;
/// the preview upload is best-effort and falls back to keeping the inline
/// content.
pub async fn prepare_page_for_save(
    mut page: JournalPage,
    files: &dyn FileStore,
) -> PortResult<JournalPage> {
    if let Some(preview) = page.preview_image.as_deref() {
        if is_inline_data_url(preview) {
            match upload_data_url(files, preview).await {
                Ok(url) => page.preview_image = Some(url),
                Err(e) => warn!("Keeping inline preview after upload failure: {}", e),
            }
        }
    }

    for item in &mut page.items {
        if item.item_type != ItemType::Text && is_inline_data_url(&item.content) {
            item.content = upload_data_url(files, &item.content).await?;
        }
        if let Some(audio) = item.audio_content.as_deref() {
            if is_inline_data_url(audio) {
                item.audio_content = Some(upload_data_url(files, audio).await?);
            }
        }
    }

    Ok(page)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /pages - The gallery listing, newest first.
///
/// Falls back to the locally cached copy when the remote store is
/// unreachable; on a fresh install the cache is seeded with example content.
#[utoipa::path(
    get,
    path = "/pages",
    responses(
        (status = 200, description = "All pages for the current user", body = [JournalPage]),
        (status = 500, description = "Store unreachable and no cached copy")
    )
)]
pub async fn list_pages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.store.list_pages(user_id).await {
        Ok(pages) => {
            if let Err(e) = state.cache.store(user_id, &pages) {
                warn!("Failed to refresh page cache: {}", e);
            }
            Ok(Json(pages))
        }
        Err(e) => {
            error!("Falling back to local cache after listing failure: {:?}", e);
            if let Some(pages) = state.cache.load(user_id) {
                return Ok(Json(pages));
            }
            if state.cache.is_first_run() {
                let pages = PageCache::seed_pages(Utc::now());
                if let Err(e) = state
                    .cache
                    .store(user_id, &pages)
                    .and_then(|_| state.cache.complete_first_run())
                {
                    warn!("Failed to seed first-run cache: {}", e);
                }
                return Ok(Json(pages));
            }
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load pages".to_string(),
            ))
        }
    }
}

/// DELETE /pages/{id} - Delete a page and all of its items.
#[utoipa::path(
    delete,
    path = "/pages/{id}",
    params(("id" = Uuid, Path, description = "The page to delete")),
    responses(
        (status = 200, description = "Page and items deleted"),
        (status = 404, description = "No such page"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_page_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(page_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .store
        .delete_page(user_id, page_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other => {
                error!("Failed to delete page: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to delete page".to_string(),
                )
            }
        })?;

    // Keep the offline copy in step with the store; a failure here only
    // degrades the fallback.
    match state.store.list_pages(user_id).await {
        Ok(pages) => {
            if let Err(e) = state.cache.store(user_id, &pages) {
                warn!("Failed to refresh page cache: {}", e);
            }
        }
        Err(e) => warn!("Skipping cache refresh after delete: {:?}", e),
    }

    Ok(StatusCode::OK)
}

/// GET /pages/{id}/export/html - Download a page as a standalone document.
#[utoipa::path(
    get,
    path = "/pages/{id}/export/html",
    params(("id" = Uuid, Path, description = "The page to export")),
    responses(
        (status = 200, description = "Self-contained HTML document", content_type = "text/html"),
        (status = 404, description = "No such page")
    )
)]
pub async fn export_page_html_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(page_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = state
        .store
        .get_page(user_id, page_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other => {
                error!("Failed to load page for export: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to export page".to_string(),
                )
            }
        })?;

    let html = render_page_html(&page);
    let disposition = format!("attachment; filename=\"{}\"", export_filename(&page));

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    ))
}
