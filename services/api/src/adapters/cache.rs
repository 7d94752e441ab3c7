//! services/api/src/adapters/cache.rs
//!
//! A local key-value fallback for the remote page store: one JSON document of
//! pages per user, plus a one-time first-run marker used to seed example
//! content. Listing falls back to this cache when the remote service is
//! unreachable, and every successful remote listing refreshes it.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;
use visual_journal_core::canvas::{CanvasSession, ItemDraft};
use visual_journal_core::domain::{JournalPage, Position};

const FIRST_RUN_MARKER: &str = "first-run";

pub struct PageCache {
    root: PathBuf,
}

impl PageCache {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn user_file(&self, user_id: Uuid) -> PathBuf {
        self.root.join(format!("{}.json", user_id))
    }

    /// The cached copy of a user's pages, if one exists and parses. This is a
    /// best-effort fallback: any read or parse failure is reported as a miss.
    pub fn load(&self, user_id: Uuid) -> Option<Vec<JournalPage>> {
        let raw = std::fs::read_to_string(self.user_file(user_id)).ok()?;
        match serde_json::from_str(&raw) {
            Ok(pages) => Some(pages),
            Err(e) => {
                warn!("Discarding unreadable page cache for {}: {}", user_id, e);
                None
            }
        }
    }

    pub fn store(&self, user_id: Uuid, pages: &[JournalPage]) -> std::io::Result<()> {
        let raw = serde_json::to_string(pages)?;
        std::fs::write(self.user_file(user_id), raw)
    }

    /// True until `complete_first_run` has been called once on this cache.
    pub fn is_first_run(&self) -> bool {
        !self.root.join(FIRST_RUN_MARKER).exists()
    }

    pub fn complete_first_run(&self) -> std::io::Result<()> {
        std::fs::write(self.root.join(FIRST_RUN_MARKER), b"false")
    }

    /// The example content shown on a fresh install: a single page with two
    /// placed notes, built through the canvas layer so ids and stacking come
    /// out the same way user-created pages do.
    pub fn seed_pages(now: DateTime<Utc>) -> Vec<JournalPage> {
        let mut session = CanvasSession::open(JournalPage::new(Uuid::new_v4(), now));
        session.insert(ItemDraft::text_note(
            "Welcome to your visual journal. Click anywhere to write a note, \
             or use the toolbar to add photos, clips and voice memos."
                .to_string(),
            Position { x: 60.0, y: 60.0 },
        ));
        session.insert(ItemDraft::text_note(
            "Drag things around until the page feels right, then save.".to_string(),
            Position { x: 120.0, y: 260.0 },
        ));
        vec![session.into_page()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path()).unwrap();
        let user = Uuid::new_v4();

        let pages = PageCache::seed_pages(Utc::now());
        cache.store(user, &pages).unwrap();

        assert_eq!(cache.load(user), Some(pages));
    }

    #[test]
    fn missing_and_corrupt_caches_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path()).unwrap();
        let user = Uuid::new_v4();

        assert_eq!(cache.load(user), None);

        std::fs::write(dir.path().join(format!("{}.json", user)), b"not json").unwrap();
        assert_eq!(cache.load(user), None);
    }

    #[test]
    fn first_run_marker_flips_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path()).unwrap();

        assert!(cache.is_first_run());
        cache.complete_first_run().unwrap();
        assert!(!cache.is_first_run());
    }

    #[test]
    fn seed_pages_have_stacked_items() {
        let pages = PageCache::seed_pages(Utc::now());
        assert_eq!(pages.len(), 1);
        let z: Vec<i64> = pages[0].items.iter().map(|i| i.z_index).collect();
        assert_eq!(z, vec![1, 2]);
        // Text-only seed content has nothing to preview.
        assert!(pages[0].preview_image.is_none());
    }
}
