//! Clipboard output.
//!
//! Copying is best-effort: a sink reports failure as `false` and never
//! raises, so a missing display server cannot fail an otherwise good run.

use std::sync::Mutex;
#[cfg(feature = "clipboard")]
use tracing::{debug, warn};

/// Destination for the serialized table.
pub trait ClipboardSink: Send + Sync {
    /// Place `text` on the clipboard. Returns `false` if the platform refused.
    fn copy(&self, text: &str) -> bool;
}

/// The system clipboard, via `arboard`.
#[cfg(feature = "clipboard")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[cfg(feature = "clipboard")]
impl ClipboardSink for SystemClipboard {
    fn copy(&self, text: &str) -> bool {
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_owned())) {
            Ok(()) => {
                debug!("Copied {} bytes to clipboard", text.len());
                true
            }
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                false
            }
        }
    }
}

/// In-process clipboard that keeps the last copied text.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn copy(&self, text: &str) -> bool {
        *self
            .contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(text.to_owned());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    impl ClipboardSink for Refusing {
        fn copy(&self, _text: &str) -> bool {
            false
        }
    }

    #[test]
    fn memory_clipboard_keeps_last_copy() {
        let cb = MemoryClipboard::new();
        assert_eq!(cb.last(), None);
        assert!(cb.copy("first"));
        assert!(cb.copy("Date\tDescription\tCategory\tAmount"));
        assert_eq!(cb.last().as_deref(), Some("Date\tDescription\tCategory\tAmount"));
    }

    #[test]
    fn failure_is_reported_not_raised() {
        let sink: &dyn ClipboardSink = &Refusing;
        assert!(!sink.copy("anything"));
    }
}
