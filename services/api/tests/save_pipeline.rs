//! Integration tests for the upload-then-URL-substitution step of the save
//! pipeline, run against an in-memory file store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use api_lib::web::pages::{decode_data_url, prepare_page_for_save, to_data_url};
use visual_journal_core::canvas::{CanvasSession, ItemDraft};
use visual_journal_core::domain::{ItemType, JournalPage, Position, StoredFile};
use visual_journal_core::ports::{FileStore, PortError, PortResult};

/// A file store double: remembers every uploaded blob, or refuses everything.
#[derive(Default)]
struct MemoryFileStore {
    files: Mutex<HashMap<String, (String, Vec<u8>)>>,
    refuse_uploads: bool,
}

impl MemoryFileStore {
    fn refusing() -> Self {
        Self {
            refuse_uploads: true,
            ..Self::default()
        }
    }

    fn stored_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, bytes: &[u8], mime: &str) -> PortResult<StoredFile> {
        if self.refuse_uploads {
            return Err(PortError::Unexpected("upload refused".to_string()));
        }
        let extension = mime.split('/').nth(1).unwrap_or("bin");
        let id = format!("{}.{}", Uuid::new_v4(), extension);
        self.files
            .lock()
            .unwrap()
            .insert(id.clone(), (mime.to_string(), bytes.to_vec()));
        let url = format!("/files/{}", id);
        Ok(StoredFile { id, url })
    }

    async fn read(&self, file_id: &str) -> PortResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| PortError::NotFound(format!("File {} not found", file_id)))
    }
}

fn page_under_edit() -> JournalPage {
    let mut session = CanvasSession::open(JournalPage::new(Uuid::new_v4(), chrono::Utc::now()));
    session.insert(ItemDraft::picked_image(
        to_data_url(b"jpeg bytes", "image/jpeg"),
        1.5,
    ));
    session.insert(ItemDraft::recorded_video("/files/already-stored.webm".to_string()));
    session.insert(ItemDraft::voice_note(
        "dictated words".to_string(),
        to_data_url(b"opus bytes", "audio/webm"),
    ));
    session.insert(ItemDraft::text_note(
        "plain words".to_string(),
        Position { x: 5.0, y: 5.0 },
    ));
    session.into_page()
}

#[tokio::test]
async fn inline_media_is_uploaded_and_substituted() {
    let files = MemoryFileStore::default();
    let page = page_under_edit();

    let prepared = prepare_page_for_save(page, &files).await.unwrap();

    // Every inline payload became a stored reference.
    assert!(prepared
        .items
        .iter()
        .all(|item| !item.content.starts_with("data:") || item.item_type == ItemType::Text));
    let audio = prepared.items[2].audio_content.as_deref().unwrap();
    assert!(audio.starts_with("/files/"));

    // The uploaded bytes are exactly the decoded payloads.
    let image_id = prepared.items[0].content.strip_prefix("/files/").unwrap();
    assert_eq!(files.read(image_id).await.unwrap(), b"jpeg bytes");

    // Preview was recomputed from the items before substitution, so it gets
    // its own best-effort upload.
    let preview = prepared.preview_image.as_deref().unwrap();
    assert!(preview.starts_with("/files/"));
}

#[tokio::test]
async fn stored_references_are_never_reuploaded() {
    let files = MemoryFileStore::default();
    let mut session = CanvasSession::open(JournalPage::new(Uuid::new_v4(), chrono::Utc::now()));
    session.insert(ItemDraft::recorded_video("/files/already-stored.webm".to_string()));
    let page = session.into_page();

    let prepared = prepare_page_for_save(page, &files).await.unwrap();

    assert_eq!(files.stored_count(), 0);
    assert_eq!(prepared.items[0].content, "/files/already-stored.webm");
    assert_eq!(
        prepared.preview_image.as_deref(),
        Some("/files/already-stored.webm")
    );
}

#[tokio::test]
async fn text_content_is_never_treated_as_media() {
    let files = MemoryFileStore::default();
    let mut session = CanvasSession::open(JournalPage::new(Uuid::new_v4(), chrono::Utc::now()));
    // A note whose text merely looks like a data URL stays text.
    session.insert(ItemDraft::text_note(
        "data:image/png;base64,not-actually-media".to_string(),
        Position { x: 0.0, y: 0.0 },
    ));
    let page = session.into_page();

    let prepared = prepare_page_for_save(page, &files).await.unwrap();

    assert_eq!(files.stored_count(), 0);
    assert!(prepared.items[0].content.starts_with("data:"));
}

#[tokio::test]
async fn item_upload_failure_aborts_the_save() {
    let files = MemoryFileStore::refusing();
    let page = page_under_edit();

    assert!(prepare_page_for_save(page, &files).await.is_err());
}

#[tokio::test]
async fn preview_upload_failure_falls_back_to_inline_content() {
    let files = MemoryFileStore::refusing();
    let mut page = JournalPage::new(Uuid::new_v4(), chrono::Utc::now());
    // No inline items to upload, only an inline preview.
    page.preview_image = Some(to_data_url(b"jpeg bytes", "image/jpeg"));

    let prepared = prepare_page_for_save(page, &files).await.unwrap();
    assert_eq!(
        prepared.preview_image.as_deref(),
        Some(to_data_url(b"jpeg bytes", "image/jpeg").as_str())
    );
}

#[test]
fn data_urls_round_trip() {
    let url = to_data_url(b"opus bytes", "audio/webm");
    let (mime, bytes) = decode_data_url(&url).unwrap();
    assert_eq!(mime, "audio/webm");
    assert_eq!(bytes, b"opus bytes");

    assert!(decode_data_url("/files/a.webm").is_err());
    assert!(decode_data_url("data:audio/webm;base64").is_err());
}
