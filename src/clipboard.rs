use crate::error::ClipboardError;
use log::debug;
use tauri::{AppHandle, Runtime};
use tauri_plugin_clipboard_manager::ClipboardExt;

/// Plain-text view of the system clipboard.
///
/// Only the text flavour is read or written. Anything else on the clipboard
/// (images, files, rich text) is invisible here and does not survive a clear.
pub trait ClipboardAccess: Send + Sync {
    /// Current text, or `None` when the clipboard holds no text.
    fn read_text(&self) -> Result<Option<String>, ClipboardError>;

    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    fn clear(&self) -> Result<(), ClipboardError>;
}

/// The backend reports an empty clipboard, or one without a text flavour, as
/// an error. Any other read error is a real failure.
fn is_no_text_available(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("not available") || message.contains("clipboard is empty")
}

/// System clipboard through `tauri-plugin-clipboard-manager`.
pub struct TauriClipboard<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriClipboard<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> ClipboardAccess for TauriClipboard<R> {
    fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        match self.app.clipboard().read_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                let message = e.to_string();
                if is_no_text_available(&message) {
                    debug!("No text on clipboard: {}", message);
                    Ok(None)
                } else {
                    Err(ClipboardError::Read(message))
                }
            }
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.app
            .clipboard()
            .write_text(text.to_string())
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }

    fn clear(&self) -> Result<(), ClipboardError> {
        self.app
            .clipboard()
            .clear()
            .map_err(|e| ClipboardError::Clear(e.to_string()))
    }
}
