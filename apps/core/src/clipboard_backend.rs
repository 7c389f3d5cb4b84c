use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard operation failed: {0}")]
    Access(String),
}

/// Raw RGBA8 pixels as exchanged with the system clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

pub trait ClipboardBackend: Send + Sync {
    fn read_text(&self) -> Option<String>;
    fn read_image(&self) -> Option<ClipboardImage>;
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
    fn write_image(&self, image: &ClipboardImage) -> Result<(), ClipboardError>;
}

pub type SharedClipboard = Arc<dyn ClipboardBackend>;

/// The desktop clipboard. The handle is opened on first use and kept, since
/// some platforms drop our selection when the owning handle goes away.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_handle<T>(
        &self,
        op: impl FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error>,
    ) -> Result<T, ClipboardError> {
        let mut guard = self.handle.lock();
        if guard.is_none() {
            let opened = arboard::Clipboard::new()
                .map_err(|error| ClipboardError::Unavailable(error.to_string()))?;
            *guard = Some(opened);
        }
        let Some(handle) = guard.as_mut() else {
            return Err(ClipboardError::Unavailable("no clipboard handle".into()));
        };
        op(handle).map_err(|error| ClipboardError::Access(error.to_string()))
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read_text(&self) -> Option<String> {
        match self.with_handle(|clipboard| clipboard.get_text()) {
            Ok(text) => Some(text),
            Err(error) => {
                debug!(%error, "no text on clipboard");
                None
            }
        }
    }

    fn read_image(&self) -> Option<ClipboardImage> {
        self.with_handle(|clipboard| clipboard.get_image())
            .ok()
            .map(|image| ClipboardImage {
                width: image.width,
                height: image.height,
                rgba: image.bytes.into_owned(),
            })
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.with_handle(|clipboard| clipboard.set_text(text.to_string()))
    }

    fn write_image(&self, image: &ClipboardImage) -> Result<(), ClipboardError> {
        self.with_handle(|clipboard| {
            clipboard.set_image(arboard::ImageData {
                width: image.width,
                height: image.height,
                bytes: Cow::Borrowed(&image.rgba),
            })
        })
    }
}

/// Process-local clipboard for tests and headless runs.
#[derive(Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
    image: Mutex<Option<ClipboardImage>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> Option<String> {
        self.text.lock().clone()
    }

    pub fn image(&self) -> Option<ClipboardImage> {
        self.image.lock().clone()
    }

    /// Simulates another application copying text.
    pub fn put_text(&self, text: &str) {
        *self.image.lock() = None;
        *self.text.lock() = Some(text.to_string());
    }

    /// Simulates another application copying an image.
    pub fn put_image(&self, image: ClipboardImage) {
        *self.text.lock() = None;
        *self.image.lock() = Some(image);
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_text(&self) -> Option<String> {
        self.text()
    }

    fn read_image(&self) -> Option<ClipboardImage> {
        self.image()
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.put_text(text);
        Ok(())
    }

    fn write_image(&self, image: &ClipboardImage) -> Result<(), ClipboardError> {
        self.put_image(image.clone());
        Ok(())
    }
}
