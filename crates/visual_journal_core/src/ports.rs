//! crates/visual_journal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AuthSession, JournalPage, StoredFile, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence of pages and their items.
///
/// `save_page` is all-or-nothing: either the page document and every item
/// document land together, or nothing is written.
#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn save_page(&self, user_id: Uuid, page: &JournalPage) -> PortResult<()>;

    /// All pages for a user, newest first.
    async fn list_pages(&self, user_id: Uuid) -> PortResult<Vec<JournalPage>>;

    async fn get_page(&self, user_id: Uuid, page_id: Uuid) -> PortResult<JournalPage>;

    /// Removes the page and every item that belongs to it.
    async fn delete_page(&self, user_id: Uuid, page_id: Uuid) -> PortResult<()>;
}

/// Session creation, credential change and session listing. The application
/// stores password hashes, never credentials.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    // --- User Management ---
    async fn create_anonymous_user(&self) -> PortResult<User>;

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_credentials(&self, user_id: Uuid) -> PortResult<UserCredentials>;

    /// Converts an anonymous account into a registered one.
    async fn attach_email(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn list_auth_sessions(&self, user_id: Uuid) -> PortResult<Vec<AuthSession>>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// Binary content, addressed by generated file ids.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, bytes: &[u8], mime: &str) -> PortResult<StoredFile>;

    async fn read(&self, file_id: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Generates a single image from a prompt, returned as an inline
    /// `data:` URL ready to place on the canvas.
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> PortResult<String>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a recorded voice note into text.
    async fn transcribe_audio(&self, audio_data: &[u8], mime: &str) -> PortResult<String>;
}
