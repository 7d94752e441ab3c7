//! crates/visual_journal_core/src/canvas.rs
//!
//! The canvas interaction layer: the working copy of the one page that is
//! open for editing. Tracks the items on the 2-D surface and implements the
//! direct-manipulation operations (insert, select/raise, pointer drag).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{CanvasItem, ItemType, JournalPage, Position, Size};

//=========================================================================================
// Errors
//=========================================================================================

/// The only intrinsic failure mode of the interaction layer: being handed an
/// id that is not on the page. Everything else operates on in-memory state
/// and cannot fail.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    #[error("no item with id {0} on this page")]
    UnknownItem(Uuid),
    #[error("no drag in progress")]
    NoActiveDrag,
}

//=========================================================================================
// Insertion drafts
//=========================================================================================

/// An item about to be placed: everything except the id and the stacking
/// order, which the session assigns on insert.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub item_type: ItemType,
    pub content: String,
    pub audio_content: Option<String>,
    pub position: Position,
    pub size: Size,
}

impl ItemDraft {
    /// An image picked from disk: fixed width, height follows the decoded
    /// aspect ratio (width / height of the source pixels).
    pub fn picked_image(content: String, aspect_ratio: f64) -> Self {
        let width = 300.0;
        let height = if aspect_ratio > 0.0 {
            width / aspect_ratio
        } else {
            width
        };
        Self {
            item_type: ItemType::Image,
            content,
            audio_content: None,
            position: Position { x: 50.0, y: 50.0 },
            size: Size { width, height },
        }
    }

    /// An AI-generated image, always placed as a square.
    pub fn generated_image(content: String) -> Self {
        Self {
            item_type: ItemType::Image,
            content,
            audio_content: None,
            position: Position { x: 70.0, y: 70.0 },
            size: Size {
                width: 300.0,
                height: 300.0,
            },
        }
    }

    /// A camera-recorded clip, 16:9.
    pub fn recorded_video(content: String) -> Self {
        Self {
            item_type: ItemType::Video,
            content,
            audio_content: None,
            position: Position { x: 90.0, y: 90.0 },
            size: Size {
                width: 320.0,
                height: 180.0,
            },
        }
    }

    /// A transcribed voice note: the text plus the recording it came from.
    pub fn voice_note(text: String, audio_content: String) -> Self {
        Self {
            item_type: ItemType::Text,
            content: text,
            audio_content: Some(audio_content),
            position: Position { x: 80.0, y: 80.0 },
            // Height is auto-sized by the text content.
            size: Size {
                width: 300.0,
                height: 0.0,
            },
        }
    }

    /// A free-text note entered at the clicked coordinate.
    pub fn text_note(text: String, position: Position) -> Self {
        Self {
            item_type: ItemType::Text,
            content: text,
            audio_content: None,
            position,
            size: Size {
                width: 250.0,
                height: 0.0,
            },
        }
    }
}

//=========================================================================================
// The editing session
//=========================================================================================

/// An in-flight pointer drag: the dragged item, its position when the drag
/// started, and the pointer anchor.
#[derive(Debug, Clone, Copy)]
struct DragState {
    item_id: Uuid,
    origin: Position,
    anchor: Position,
}

/// The editing session for the single active page.
///
/// Stacking policy: "most-recently-touched wins". Every insert and every
/// selection takes the next value from a counter owned by this session and
/// re-derived from the page maximum on open — deliberately not bring-to-front
/// / send-to-back commands, and deliberately not process-wide state.
pub struct CanvasSession {
    page_id: Uuid,
    date: DateTime<Utc>,
    items: Vec<CanvasItem>,
    selected: Option<Uuid>,
    next_z_index: i64,
    drag: Option<DragState>,
}

impl CanvasSession {
    /// Opens a page for editing, seeding the z-index counter with
    /// `max(existing) + 1`.
    pub fn open(page: JournalPage) -> Self {
        let next_z_index = page.items.iter().map(|i| i.z_index).max().unwrap_or(0) + 1;
        Self {
            page_id: page.id,
            date: page.date,
            items: page.items,
            selected: None,
            next_z_index,
            drag: None,
        }
    }

    fn take_z_index(&mut self) -> i64 {
        let z = self.next_z_index;
        self.next_z_index += 1;
        z
    }

    fn find_mut(&mut self, item_id: Uuid) -> Result<&mut CanvasItem, CanvasError> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(CanvasError::UnknownItem(item_id))
    }

    /// Places a draft on the page: mints a fresh id, assigns the next
    /// stacking value and appends. There is no upper bound on item count and
    /// no collision is possible since ids are freshly minted.
    pub fn insert(&mut self, draft: ItemDraft) -> &CanvasItem {
        let z_index = self.take_z_index();
        self.items.push(CanvasItem {
            id: Uuid::new_v4(),
            item_type: draft.item_type,
            content: draft.content,
            audio_content: draft.audio_content,
            position: draft.position,
            size: draft.size,
            z_index,
        });
        self.items.last().expect("just pushed")
    }

    /// Marks the item selected and raises it above everything else by giving
    /// it the next counter value. Returns the new z-index.
    pub fn select(&mut self, item_id: Uuid) -> Result<i64, CanvasError> {
        // Check existence before taking a counter value, so a miss does not
        // burn a stacking slot.
        if !self.items.iter().any(|item| item.id == item_id) {
            return Err(CanvasError::UnknownItem(item_id));
        }
        let z_index = self.take_z_index();
        self.find_mut(item_id)?.z_index = z_index;
        self.selected = Some(item_id);
        Ok(z_index)
    }

    /// A click on the empty surface: drops the selection. The caller follows
    /// up with a `text_note` insert at the click coordinate.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_item(&self) -> Option<Uuid> {
        self.selected
    }

    /// Starts a pointer drag, remembering the item's position and the
    /// pointer anchor.
    pub fn begin_drag(&mut self, item_id: Uuid, pointer: Position) -> Result<(), CanvasError> {
        let origin = self.find_mut(item_id)?.position;
        self.drag = Some(DragState {
            item_id,
            origin,
            anchor: pointer,
        });
        Ok(())
    }

    /// A pointer-move during a drag: pure translation from the drag origin,
    /// `origin + (pointer - anchor)`. No bounds clamping and no collision
    /// avoidance; items may overlap or leave the visible surface. Computing
    /// from the origin rather than the previous position keeps intermediate
    /// pointer jitter from accumulating.
    pub fn drag_to(&mut self, pointer: Position) -> Result<Position, CanvasError> {
        let drag = self.drag.ok_or(CanvasError::NoActiveDrag)?;
        let position = Position {
            x: drag.origin.x + (pointer.x - drag.anchor.x),
            y: drag.origin.y + (pointer.y - drag.anchor.y),
        };
        self.find_mut(drag.item_id)?.position = position;
        Ok(position)
    }

    /// Pointer release: stop listening. No snapping, no alignment.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn page_id(&self) -> Uuid {
        self.page_id
    }

    pub fn items(&self) -> &[CanvasItem] {
        &self.items
    }

    /// The current working copy as a page, for rendering to clients.
    pub fn snapshot(&self) -> JournalPage {
        JournalPage {
            id: self.page_id,
            date: self.date,
            items: self.items.clone(),
            preview_image: None,
        }
    }

    /// Consumes the session into a page ready for the save pipeline.
    pub fn into_page(self) -> JournalPage {
        let mut page = JournalPage {
            id: self.page_id,
            date: self.date,
            items: self.items,
            preview_image: None,
        };
        page.recompute_preview();
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_session() -> CanvasSession {
        CanvasSession::open(JournalPage::new(Uuid::new_v4(), Utc::now()))
    }

    fn note(text: &str) -> ItemDraft {
        ItemDraft::text_note(text.to_string(), Position { x: 10.0, y: 20.0 })
    }

    #[test]
    fn inserted_z_indices_are_strictly_increasing_and_unique() {
        let mut session = empty_session();
        for i in 0..50 {
            session.insert(note(&format!("note {i}")));
        }

        let z: Vec<i64> = session.items().iter().map(|i| i.z_index).collect();
        assert!(z.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn counter_is_seeded_above_the_existing_maximum() {
        let mut page = JournalPage::new(Uuid::new_v4(), Utc::now());
        page.items.push(CanvasItem {
            id: Uuid::new_v4(),
            item_type: ItemType::Text,
            content: "a".to_string(),
            audio_content: None,
            position: Position { x: 0.0, y: 0.0 },
            size: Size {
                width: 250.0,
                height: 0.0,
            },
            z_index: 41,
        });

        let mut session = CanvasSession::open(page);
        assert_eq!(session.insert(note("b")).z_index, 42);
    }

    #[test]
    fn select_raises_item_to_the_new_page_maximum() {
        let mut session = empty_session();
        let first = session.insert(note("a")).id;
        session.insert(note("b"));
        session.insert(note("c"));

        let raised = session.select(first).unwrap();
        let max = session.items().iter().map(|i| i.z_index).max().unwrap();
        assert_eq!(raised, max);
        assert_eq!(session.selected_item(), Some(first));

        // Raising again keeps climbing; the counter never reuses a value.
        let raised_again = session.select(first).unwrap();
        assert!(raised_again > raised);
    }

    #[test]
    fn select_unknown_item_is_an_error_and_burns_no_slot() {
        let mut session = empty_session();
        let id = session.insert(note("a")).id;
        let missing = Uuid::new_v4();
        assert_eq!(
            session.select(missing),
            Err(CanvasError::UnknownItem(missing))
        );

        // The failed select must not have consumed a counter value.
        let before = session.items()[0].z_index;
        assert_eq!(session.select(id).unwrap(), before + 1);
    }

    #[test]
    fn drag_moves_by_exact_pointer_delta_despite_jitter() {
        let mut session = empty_session();
        let id = session.insert(note("a")).id;
        let start = session.items()[0].position;

        session
            .begin_drag(id, Position { x: 500.0, y: 500.0 })
            .unwrap();
        // Intermediate jitter must not accumulate.
        session.drag_to(Position { x: 123.0, y: 999.0 }).unwrap();
        session.drag_to(Position { x: 871.0, y: -4.0 }).unwrap();
        let end = session
            .drag_to(Position { x: 530.0, y: 460.0 })
            .unwrap();
        session.end_drag();

        assert_eq!(end.x, start.x + 30.0);
        assert_eq!(end.y, start.y - 40.0);
    }

    #[test]
    fn drag_without_begin_is_an_error() {
        let mut session = empty_session();
        session.insert(note("a"));
        assert_eq!(
            session.drag_to(Position { x: 0.0, y: 0.0 }),
            Err(CanvasError::NoActiveDrag)
        );
    }

    #[test]
    fn drag_is_pure_translation_with_no_clamping() {
        let mut session = empty_session();
        let id = session.insert(note("a")).id;

        session.begin_drag(id, Position { x: 0.0, y: 0.0 }).unwrap();
        let moved = session
            .drag_to(Position {
                x: -5000.0,
                y: -5000.0,
            })
            .unwrap();

        // Items may leave the visible surface arbitrarily.
        assert!(moved.x < 0.0 && moved.y < 0.0);
    }

    #[test]
    fn clear_selection_on_outside_click() {
        let mut session = empty_session();
        let id = session.insert(note("a")).id;
        session.select(id).unwrap();
        session.clear_selection();
        assert_eq!(session.selected_item(), None);
    }

    #[test]
    fn into_page_recomputes_the_preview() {
        let mut session = empty_session();
        session.insert(note("words first"));
        session.insert(ItemDraft::recorded_video("/files/clip.webm".to_string()));

        let page = session.into_page();
        assert_eq!(page.preview_image.as_deref(), Some("/files/clip.webm"));
    }

    #[test]
    fn picked_image_height_follows_aspect_ratio() {
        let draft = ItemDraft::picked_image("/files/p.jpg".to_string(), 2.0);
        assert_eq!(draft.size.width, 300.0);
        assert_eq!(draft.size.height, 150.0);

        // A degenerate ratio falls back to a square rather than dividing by zero.
        let square = ItemDraft::picked_image("/files/p.jpg".to_string(), 0.0);
        assert_eq!(square.size.height, 300.0);
    }
}
