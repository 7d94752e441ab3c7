//! services/api/src/web/canvas.rs
//!
//! The editing surface: opening/closing the active page, the five insertion
//! actions, selection and pointer drags, the save pipeline entry point, and
//! the per-clip GIF export.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::GifExporter;
use crate::web::pages::{decode_data_url, prepare_page_for_save, to_data_url};
use crate::web::state::{ActiveCanvas, AppState};
use visual_journal_core::canvas::{CanvasError, CanvasSession, ItemDraft};
use visual_journal_core::domain::{is_inline_data_url, ItemType, JournalPage, Position};
use visual_journal_core::ports::{PortError, PortResult};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct OpenCanvasRequest {
    /// The page to edit; omit to start a fresh page dated now.
    pub page_id: Option<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectRequest {
    pub item_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct SelectResponse {
    /// The item's new stacking value, now the page maximum.
    pub z_index: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct BeginDragRequest {
    pub item_id: Uuid,
    pub pointer: Position,
}

#[derive(Deserialize, ToSchema)]
pub struct DragMoveRequest {
    pub pointer: Position,
}

#[derive(Deserialize, ToSchema)]
pub struct TextNoteRequest {
    pub text: String,
    /// The click coordinate on the empty surface.
    pub position: Position,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateImageRequest {
    pub prompt: String,
    /// Defaults to a square image.
    pub aspect_ratio: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    pub page_id: Uuid,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// The active session, provided it exists and belongs to the caller.
fn active_session<'a>(
    active: &'a mut Option<ActiveCanvas>,
    user_id: Uuid,
) -> Result<&'a mut CanvasSession, (StatusCode, String)> {
    let active = active.as_mut().ok_or((
        StatusCode::CONFLICT,
        "No page is open for editing".to_string(),
    ))?;
    if active.user_id != user_id {
        return Err((
            StatusCode::CONFLICT,
            "Another account's page is open for editing".to_string(),
        ));
    }
    Ok(&mut active.session)
}

fn canvas_error(e: CanvasError) -> (StatusCode, String) {
    match e {
        CanvasError::UnknownItem(_) => (StatusCode::NOT_FOUND, e.to_string()),
        CanvasError::NoActiveDrag => (StatusCode::CONFLICT, e.to_string()),
    }
}

/// Reads the single file part of an upload form.
async fn first_file_field(
    multipart: &mut Multipart,
    default_mime: &str,
) -> Result<(String, Bytes), (StatusCode, String)> {
    if let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let mime = field
            .content_type()
            .unwrap_or(default_mime)
            .split(';')
            .next()
            .unwrap_or(default_mime)
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        Ok((mime, data))
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ))
    }
}

//=========================================================================================
// Session Lifecycle Handlers
//=========================================================================================

/// POST /canvas/open - Open a page for editing (or start a new one).
#[utoipa::path(
    post,
    path = "/canvas/open",
    request_body = OpenCanvasRequest,
    responses(
        (status = 200, description = "The working copy now open for editing", body = JournalPage),
        (status = 404, description = "No such page")
    )
)]
pub async fn open_canvas_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<OpenCanvasRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = match req.page_id {
        Some(page_id) => state
            .store
            .get_page(user_id, page_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                other => {
                    error!("Failed to open page: {:?}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to open page".to_string(),
                    )
                }
            })?,
        None => JournalPage::new(Uuid::new_v4(), Utc::now()),
    };

    let session = CanvasSession::open(page);
    let snapshot = session.snapshot();

    // Opening replaces whatever was open; an unsaved working copy is
    // discarded, the same as navigating away.
    let mut active = state.active.lock().await;
    *active = Some(ActiveCanvas { user_id, session });

    Ok(Json(snapshot))
}

/// POST /canvas/close - Abandon the open page without saving.
#[utoipa::path(
    post,
    path = "/canvas/close",
    responses(
        (status = 200, description = "Working copy discarded"),
        (status = 409, description = "Nothing is open")
    )
)]
pub async fn close_canvas_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    active_session(&mut active, user_id)?;
    *active = None;
    Ok(StatusCode::OK)
}

/// POST /canvas/save - Persist the open page and close it.
///
/// The preview is recomputed from the working items, inline media is uploaded
/// and substituted, and the whole page is written in one transaction. On any
/// failure the working copy is restored unchanged and stays open.
#[utoipa::path(
    post,
    path = "/canvas/save",
    responses(
        (status = 200, description = "Page saved", body = SaveResponse),
        (status = 409, description = "Nothing is open"),
        (status = 500, description = "Save failed; the working copy is untouched")
    )
)]
pub async fn save_canvas_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    let Some(open) = active.take() else {
        return Err((
            StatusCode::CONFLICT,
            "No page is open for editing".to_string(),
        ));
    };
    if open.user_id != user_id {
        *active = Some(open);
        return Err((
            StatusCode::CONFLICT,
            "Another account's page is open for editing".to_string(),
        ));
    }

    let page = open.session.into_page();
    let restore = page.clone();

    let saved: PortResult<()> = async {
        let prepared = prepare_page_for_save(page, state.files.as_ref()).await?;
        state.store.save_page(user_id, &prepared).await
    }
    .await;

    match saved {
        Ok(()) => {
            drop(active);
            if let Ok(pages) = state.store.list_pages(user_id).await {
                if let Err(e) = state.cache.store(user_id, &pages) {
                    tracing::warn!("Failed to refresh page cache: {}", e);
                }
            }
            Ok(Json(SaveResponse {
                page_id: restore.id,
            }))
        }
        Err(e) => {
            error!("Failed to save page: {:?}", e);
            *active = Some(ActiveCanvas {
                user_id,
                session: CanvasSession::open(restore),
            });
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save page".to_string(),
            ))
        }
    }
}

//=========================================================================================
// Interaction Handlers
//=========================================================================================

/// POST /canvas/select - Select an item, raising it above everything else.
pub async fn select_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SelectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    let z_index = session.select(req.item_id).map_err(canvas_error)?;
    Ok(Json(SelectResponse { z_index }))
}

/// POST /canvas/drag/begin - Press on an item. Selects it (raising its
/// stacking order, pointer-down semantics) and anchors the drag.
pub async fn begin_drag_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<BeginDragRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    session.select(req.item_id).map_err(canvas_error)?;
    session
        .begin_drag(req.item_id, req.pointer)
        .map_err(canvas_error)?;
    Ok(StatusCode::OK)
}

/// POST /canvas/drag/move - A pointer-move during the drag.
pub async fn drag_move_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<DragMoveRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    let position = session.drag_to(req.pointer).map_err(canvas_error)?;
    Ok(Json(position))
}

/// POST /canvas/drag/end - Pointer release.
pub async fn end_drag_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    session.end_drag();
    Ok(StatusCode::OK)
}

//=========================================================================================
// Insertion Handlers
//=========================================================================================

/// POST /canvas/items/text - A click on the empty surface: clears the
/// selection and, if text was entered, places a note at the click coordinate.
pub async fn insert_text_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<TextNoteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    session.clear_selection();

    if req.text.trim().is_empty() {
        // Dismissed prompt: deselection already happened, nothing is placed.
        return Ok((StatusCode::OK, Json(None)));
    }

    let item = session
        .insert(ItemDraft::text_note(req.text, req.position))
        .clone();
    Ok((StatusCode::CREATED, Json(Some(item))))
}

/// POST /canvas/items/image - Place a picked image file.
pub async fn insert_image_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mime, data) = first_file_field(&mut multipart, "image/png").await?;

    // Decode just enough to size the item proportionally.
    let decoded = image::load_from_memory(&data).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Could not decode image: {}", e),
        )
    })?;
    let aspect_ratio = decoded.width() as f64 / decoded.height() as f64;
    let content = to_data_url(&data, &mime);

    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    let item = session
        .insert(ItemDraft::picked_image(content, aspect_ratio))
        .clone();
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /canvas/items/video - Place a camera-recorded clip.
pub async fn insert_video_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mime, data) = first_file_field(&mut multipart, "video/webm").await?;
    let content = to_data_url(&data, &mime);

    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    let item = session.insert(ItemDraft::recorded_video(content)).clone();
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /canvas/items/generate - Place an AI-generated image.
pub async fn generate_image_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please enter a prompt".to_string()));
    }
    let aspect_ratio = req.aspect_ratio.as_deref().unwrap_or("1:1");

    // The generation call runs outside the canvas lock; it can take a while
    // and is not cancellable once started.
    let content = state
        .image_adapter
        .generate_image(prompt, aspect_ratio)
        .await
        .map_err(|e| {
            error!("Image generation failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate image. Please try again.".to_string(),
            )
        })?;

    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    let item = session.insert(ItemDraft::generated_image(content)).clone();
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /canvas/items/voice - Transcribe a recorded voice note and place the
/// text with its recording attached. An empty transcription places nothing.
pub async fn insert_voice_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mime, data) = first_file_field(&mut multipart, "audio/webm").await?;

    let transcript = state
        .stt_adapter
        .transcribe_audio(&data, &mime)
        .await
        .map_err(|e| {
            error!("Transcription failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Transcription failed. Please try again.".to_string(),
            )
        })?;

    if transcript.trim().is_empty() {
        return Ok((StatusCode::OK, Json(None)));
    }

    let audio = to_data_url(&data, &mime);

    let mut active = state.active.lock().await;
    let session = active_session(&mut active, user_id)?;
    let item = session
        .insert(ItemDraft::voice_note(transcript, audio))
        .clone();
    Ok((StatusCode::CREATED, Json(Some(item))))
}

//=========================================================================================
// GIF Export Handler
//=========================================================================================

/// POST /canvas/items/{id}/gif - Convert a recorded clip on the open page
/// into an animated image, offered as a download.
pub async fn export_gif_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Resolve the clip under the lock, transcode outside it.
    let content = {
        let mut active = state.active.lock().await;
        let session = active_session(&mut active, user_id)?;
        let item = session
            .items()
            .iter()
            .find(|item| item.id == item_id)
            .ok_or((StatusCode::NOT_FOUND, "No such item".to_string()))?;
        if item.item_type != ItemType::Video {
            return Err((
                StatusCode::BAD_REQUEST,
                "Only video items can be exported as GIF".to_string(),
            ));
        }
        item.content.clone()
    };

    let video = if is_inline_data_url(&content) {
        decode_data_url(&content)
            .map_err(|e| {
                error!("Unreadable inline video content: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to export GIF".to_string(),
                )
            })?
            .1
    } else if let Some(file_id) = content.strip_prefix("/files/") {
        state.files.read(file_id).await.map_err(|e| {
            error!("Failed to read stored clip: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to export GIF".to_string(),
            )
        })?
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Video content is not exportable".to_string(),
        ));
    };

    let gif = state
        .gif
        .convert(&video, |milestone| info!("GIF export: {}", milestone))
        .await
        .map_err(|e| {
            error!("GIF conversion failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to export GIF: {}", e),
            )
        })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        GifExporter::download_filename(Utc::now())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "image/gif".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        gif,
    ))
}
