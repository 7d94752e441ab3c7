//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the active editing session.

use crate::adapters::{GifExporter, PageCache};
use crate::config::Config;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use visual_journal_core::canvas::CanvasSession;
use visual_journal_core::ports::{
    FileStore, IdentityStore, ImageGenerationService, JournalStore, SpeechToTextService,
};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub store: Arc<dyn JournalStore>,
    pub identity: Arc<dyn IdentityStore>,
    pub files: Arc<dyn FileStore>,
    pub image_adapter: Arc<dyn ImageGenerationService>,
    pub stt_adapter: Arc<dyn SpeechToTextService>,
    pub cache: Arc<PageCache>,
    pub gif: GifExporter,
    pub config: Arc<Config>,
    /// At most one page is open for editing at a time; opening another page
    /// replaces this one. All canvas mutations go through this lock.
    pub active: Mutex<Option<ActiveCanvas>>,
}

//=========================================================================================
// ActiveCanvas (The One Open Page)
//=========================================================================================

/// The editing session for the currently open page, and who opened it.
pub struct ActiveCanvas {
    pub user_id: Uuid,
    pub session: CanvasSession,
}
