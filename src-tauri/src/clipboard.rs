//! System clipboard sink backed by `arboard`.

use crate::pipeline::ClipboardSink;
use arboard::Clipboard;

pub struct ArboardClipboard;

impl ClipboardSink for ArboardClipboard {
    fn set_text(&self, text: &str) -> Result<(), String> {
        let mut clipboard =
            Clipboard::new().map_err(|e| format!("Clipboard unavailable: {}", e))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| format!("Clipboard write failed: {}", e))
    }
}
