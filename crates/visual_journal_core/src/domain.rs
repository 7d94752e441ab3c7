//! crates/visual_journal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The closed set of things that can be placed on a page. Not extensible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemType {
    Image,
    Text,
    Video,
}

impl ItemType {
    /// The tag stored in the items collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Image => "IMAGE",
            ItemType::Text => "TEXT",
            ItemType::Video => "VIDEO",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "IMAGE" => Some(ItemType::Image),
            "TEXT" => Some(ItemType::Text),
            "VIDEO" => Some(ItemType::Video),
            _ => None,
        }
    }
}

/// A 2-D coordinate in page-surface space, top-left anchored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Width and height in page-surface units.
///
/// For `Text` items the height is not meaningful (the content auto-sizes it)
/// and renderers must disregard it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// One placed object on the page surface.
///
/// `content` is either a stored-file URL or an inline `data:` URL that has not
/// been uploaded yet. `audio_content` is a voice recording attached to a Text
/// item (produced by dictation); it is never present on Image/Video items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CanvasItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_content: Option<String>,
    pub position: Position,
    pub size: Size,
    pub z_index: i64,
}

/// A dated collection of canvas items, the unit of save/load/delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalPage {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    /// Insertion order. Visual stacking is controlled by `z_index` alone.
    pub items: Vec<CanvasItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
}

impl JournalPage {
    /// An empty page. The date is supplied by the caller so the core stays
    /// clock-free in tests.
    pub fn new(id: Uuid, date: DateTime<Utc>) -> Self {
        Self {
            id,
            date,
            items: Vec::new(),
            preview_image: None,
        }
    }

    /// Recomputes the preview from the current items: the content of the
    /// first Image/Video item in insertion order, or nothing.
    ///
    /// Invariant: the preview is always derived at save time, never stored
    /// independently of the items.
    pub fn recompute_preview(&mut self) {
        self.preview_image = self
            .items
            .iter()
            .find(|item| matches!(item.item_type, ItemType::Image | ItemType::Video))
            .map(|item| item.content.clone());
    }
}

/// Whether a content string is still inline-encoded bytes awaiting upload.
pub fn is_inline_data_url(content: &str) -> bool {
    content.starts_with("data:")
}

/// Extracts the MIME type out of a `data:<mime>;base64,<payload>` URL.
pub fn data_url_mime(content: &str) -> Option<&str> {
    content
        .strip_prefix("data:")?
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
}

/// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>, // Anonymous users have no email
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A blob handed to the file store, addressed by a generated file id.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(item_type: ItemType, content: &str) -> CanvasItem {
        CanvasItem {
            id: Uuid::new_v4(),
            item_type,
            content: content.to_string(),
            audio_content: None,
            position: Position { x: 0.0, y: 0.0 },
            size: Size {
                width: 100.0,
                height: 100.0,
            },
            z_index: 1,
        }
    }

    #[test]
    fn preview_is_first_image_or_video_in_insertion_order() {
        let mut page = JournalPage::new(Uuid::new_v4(), Utc::now());
        page.items.push(item(ItemType::Text, "hello"));
        page.items.push(item(ItemType::Video, "/files/clip.webm"));
        page.items.push(item(ItemType::Image, "/files/photo.jpg"));

        page.recompute_preview();
        assert_eq!(page.preview_image.as_deref(), Some("/files/clip.webm"));
    }

    #[test]
    fn preview_clears_when_no_media_remains() {
        let mut page = JournalPage::new(Uuid::new_v4(), Utc::now());
        page.preview_image = Some("stale".to_string());
        page.items.push(item(ItemType::Text, "only text"));

        page.recompute_preview();
        assert!(page.preview_image.is_none());
    }

    #[test]
    fn data_url_mime_extraction() {
        assert_eq!(
            data_url_mime("data:image/jpeg;base64,abcd"),
            Some("image/jpeg")
        );
        assert_eq!(data_url_mime("https://host/files/x.png"), None);
        assert!(is_inline_data_url("data:video/webm;base64,aa"));
        assert!(!is_inline_data_url("/files/aa.webm"));
    }
}
