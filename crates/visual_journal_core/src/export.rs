//! crates/visual_journal_core/src/export.rs
//!
//! Deterministic serialization of a page into a standalone HTML document.
//! The output has no external dependencies: media is embedded or referenced
//! by the item content, and a small inline script plays an item's attached
//! voice recording on click.

use crate::domain::{CanvasItem, ItemType, JournalPage};

/// At most one recording plays at a time: starting a clip pauses and resets
/// whichever clip currently holds the global handle.
const PLAYBACK_SCRIPT: &str = r#"
        let currentAudio = null;
        function playAudio(id) {
            const audio = document.getElementById('audio-' + id);
            if (audio) {
                if (currentAudio && currentAudio !== audio) {
                    currentAudio.pause();
                    currentAudio.currentTime = 0;
                }
                currentAudio = audio;
                audio.play();
            }
        }
"#;

fn escape_html(unsafe_text: &str) -> String {
    unsafe_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

fn item_markup(item: &CanvasItem) -> String {
    let style = format!(
        "position: absolute; left: {}px; top: {}px; width: {}px; z-index: {}; \
         box-shadow: 0 10px 15px -3px rgba(0,0,0,0.1), 0 4px 6px -2px rgba(0,0,0,0.05); \
         border-radius: 8px;",
        item.position.x, item.position.y, item.size.width, item.z_index
    );

    match item.item_type {
        ItemType::Image => format!(
            r#"<img src="{}" style="{} height: {}px; object-fit: cover;" />"#,
            item.content, style, item.size.height
        ),
        ItemType::Video => format!(
            r#"<video src="{}" style="{} height: {}px; object-fit: cover;" autoplay loop muted playsinline></video>"#,
            item.content, style, item.size.height
        ),
        ItemType::Text => {
            // Text height is auto-sized; the stored height is disregarded.
            let container_style = format!(
                "{style} height: auto; background-color: rgba(0,0,0,0.6); color: white; \
                 padding: 16px; font-family: 'Courier Prime', monospace; font-size: 16px;"
            );
            match &item.audio_content {
                Some(audio) => format!(
                    r#"<div style="{container_style}" onclick="playAudio('{id}')" class="text-item-with-audio">
    {text}
    <audio id="audio-{id}" src="{audio}"></audio>
    <svg viewBox="0 0 24 24" fill="currentColor" style="position: absolute; bottom: 8px; right: 8px; width: 20px; height: 20px; opacity: 0.7;"><path fill-rule="evenodd" d="M4.5 5.653c0-1.426 1.529-2.33 2.779-1.643l11.54 6.647c1.295.742 1.295 2.545 0 3.286L7.279 20.99c-1.25.72-2.779-.217-2.779-1.643V5.653Z" clip-rule="evenodd" /></svg>
</div>"#,
                    id = item.id,
                    text = escape_html(&item.content),
                ),
                None => format!(
                    r#"<div style="{container_style}">{}</div>"#,
                    escape_html(&item.content)
                ),
            }
        }
    }
}

/// Serializes the page into a self-contained document. Items are emitted in
/// ascending z-index order regardless of their order in the collection, so
/// later markup stacks above earlier markup even without z-index support.
pub fn render_page_html(page: &JournalPage) -> String {
    let mut items: Vec<&CanvasItem> = page.items.iter().collect();
    items.sort_by_key(|item| item.z_index);

    let items_html = items
        .iter()
        .map(|item| item_markup(item))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Journal - {date}</title>
    <style>
        body {{ margin: 0; background-color: #f5f5f4; overflow: hidden; height: 100vh; }}
        .text-item-with-audio {{ cursor: pointer; }}
    </style>
</head>
<body>
    <div style="position: relative; width: 100%; height: 100%;">
{items_html}
    </div>
    <script>{script}</script>
</body>
</html>
"#,
        date = page.date.format("%-m/%-d/%Y"),
        script = PLAYBACK_SCRIPT,
    )
}

/// Download filename for an exported page, derived from the page date.
pub fn export_filename(page: &JournalPage) -> String {
    format!("journal-{}.html", page.date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Position, Size};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn item(item_type: ItemType, content: &str, z_index: i64) -> CanvasItem {
        CanvasItem {
            id: Uuid::new_v4(),
            item_type,
            content: content.to_string(),
            audio_content: None,
            position: Position { x: 10.0, y: 20.0 },
            size: Size {
                width: 300.0,
                height: 200.0,
            },
            z_index,
        }
    }

    fn page_with(items: Vec<CanvasItem>) -> JournalPage {
        JournalPage {
            id: Uuid::new_v4(),
            date: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            items,
            preview_image: None,
        }
    }

    #[test]
    fn items_render_in_ascending_z_order_regardless_of_collection_order() {
        let page = page_with(vec![
            item(ItemType::Image, "/files/top.jpg", 9),
            item(ItemType::Image, "/files/bottom.jpg", 1),
            item(ItemType::Image, "/files/middle.jpg", 4),
        ]);

        let html = render_page_html(&page);
        let bottom = html.find("/files/bottom.jpg").unwrap();
        let middle = html.find("/files/middle.jpg").unwrap();
        let top = html.find("/files/top.jpg").unwrap();
        assert!(bottom < middle && middle < top);
    }

    #[test]
    fn text_content_is_escaped() {
        let page = page_with(vec![item(ItemType::Text, "<script>alert('x')</script>", 1)]);
        let html = render_page_html(&page);
        assert!(html.contains("&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn voice_note_gets_click_to_play_wiring_and_single_global_handle() {
        let mut note = item(ItemType::Text, "remember this", 2);
        note.audio_content = Some("/files/memo.webm".to_string());
        let id = note.id;
        let page = page_with(vec![note]);

        let html = render_page_html(&page);
        assert!(html.contains(&format!("playAudio('{id}')")));
        assert!(html.contains(&format!(r#"<audio id="audio-{id}" src="/files/memo.webm">"#)));
        assert!(html.contains("currentAudio.pause();"));
    }

    #[test]
    fn text_height_is_auto_not_the_stored_height() {
        let page = page_with(vec![item(ItemType::Text, "tall story", 1)]);
        let html = render_page_html(&page);
        assert!(html.contains("height: auto;"));
        assert!(!html.contains("height: 200px"));
    }

    #[test]
    fn empty_page_still_renders_a_complete_document() {
        let html = render_page_html(&page_with(vec![]));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn filename_uses_the_page_date() {
        let page = page_with(vec![]);
        assert_eq!(export_filename(&page), "journal-2024-03-09.html");
    }
}
