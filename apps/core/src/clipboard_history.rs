use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clipboard_backend::{ClipboardImage, SharedClipboard};
use crate::config::Config;
use crate::crypto::{load_or_create_key, CryptoError, HistoryCipher};
use crate::model::{ResultItem, TAG_CLIPBOARD};
use crate::provider::{Provider, ProviderError};

pub const TEXT_HISTORY_CAP: usize = 500;
pub const IMAGE_HISTORY_CAP: usize = 100;
const IMAGE_DEDUP_WINDOW: usize = 5;
const PREVIEW_CHARS: usize = 50;
const HISTORY_FILE_NAME: &str = "history.json";
const ALIASES: [&str; 2] = ["clipboard", "clip"];
const IMAGE_PLACEHOLDER: &str = "Image";
const TEXT_ICON: &str = "text-plain";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode history: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("image buffer does not match {width}x{height}")]
    InvalidImage { width: usize, height: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardEntry {
    pub kind: EntryKind,
    /// The copied text, or a placeholder label for images.
    pub data: String,
    pub preview: String,
    pub captured_at: DateTime<Local>,
    pub image_path: Option<PathBuf>,
}

impl ClipboardEntry {
    /// What a result item carries to find this entry again.
    pub fn key(&self) -> String {
        match &self.image_path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => self.data.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    t: EntryKind,
    d: String,
    p: String,
    ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCaps {
    pub text: usize,
    pub image: usize,
}

impl Default for HistoryCaps {
    fn default() -> Self {
        Self {
            text: TEXT_HISTORY_CAP,
            image: IMAGE_HISTORY_CAP,
        }
    }
}

#[derive(Default)]
struct WriterState {
    pending: Option<Vec<ClipboardEntry>>,
    busy: bool,
    closed: bool,
}

type WriterShared = Arc<(Mutex<WriterState>, Condvar)>;

/// Writes history snapshots on its own thread. Only the newest scheduled
/// snapshot is written; older ones still waiting are replaced.
struct HistoryWriter {
    shared: WriterShared,
    thread: Option<JoinHandle<()>>,
}

impl HistoryWriter {
    fn spawn(path: PathBuf, cipher: HistoryCipher) -> std::io::Result<Self> {
        let shared: WriterShared = Arc::default();
        let worker = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("clipboard-history-writer".to_string())
            .spawn(move || write_loop(&path, &cipher, &worker))?;
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    fn schedule(&self, snapshot: Vec<ClipboardEntry>) {
        let (state, signal) = &*self.shared;
        state.lock().pending = Some(snapshot);
        signal.notify_all();
    }

    /// Blocks until every scheduled snapshot is on disk.
    fn flush(&self) {
        let (state, signal) = &*self.shared;
        let mut state = state.lock();
        while state.pending.is_some() || state.busy {
            signal.wait(&mut state);
        }
    }
}

impl Drop for HistoryWriter {
    fn drop(&mut self) {
        {
            let (state, signal) = &*self.shared;
            state.lock().closed = true;
            signal.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("clipboard history writer panicked");
            }
        }
    }
}

fn write_loop(path: &Path, cipher: &HistoryCipher, shared: &WriterShared) {
    let (state, signal) = &**shared;
    let mut state = state.lock();
    loop {
        if let Some(snapshot) = state.pending.take() {
            state.busy = true;
            MutexGuard::unlocked(&mut state, || {
                if let Err(error) = write_history(path, cipher, &snapshot) {
                    warn!(%error, "failed to persist clipboard history");
                }
            });
            state.busy = false;
            signal.notify_all();
            continue;
        }
        if state.closed {
            break;
        }
        signal.wait(&mut state);
    }
}

/// Encrypted, size-capped clipboard history, newest first.
pub struct ClipboardStore {
    dir: PathBuf,
    cipher: HistoryCipher,
    history: Vec<ClipboardEntry>,
    caps: HistoryCaps,
    backend: SharedClipboard,
    enabled: bool,
    last_seen: Option<Vec<u8>>,
    writer: HistoryWriter,
}

impl ClipboardStore {
    pub fn from_config(cfg: &Config, backend: SharedClipboard) -> Result<Self, StoreError> {
        let caps = HistoryCaps {
            text: cfg.clipboard_text_cap,
            image: cfg.clipboard_image_cap,
        };
        let mut store = Self::open(&cfg.clipboard_dir(), caps, backend)?;
        store.enabled = cfg.clipboard_enabled;
        Ok(store)
    }

    pub fn open(
        dir: &Path,
        caps: HistoryCaps,
        backend: SharedClipboard,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let cipher = HistoryCipher::new(load_or_create_key(dir)?)?;
        let writer = HistoryWriter::spawn(dir.join(HISTORY_FILE_NAME), cipher.clone())
            .map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        let mut store = Self {
            dir: dir.to_path_buf(),
            cipher,
            history: Vec::new(),
            caps,
            backend,
            enabled: true,
            last_seen: None,
            writer,
        };
        store.history = store.load_history();
        info!(entries = store.history.len(), "clipboard history loaded");
        Ok(store)
    }

    pub fn entries(&self) -> &[ClipboardEntry] {
        &self.history
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE_NAME)
    }

    /// Reads the backend once and records whatever changed since the last poll.
    pub fn poll_backend(&mut self) -> bool {
        if !self.enabled {
            return false;
        }

        if let Some(image) = self.backend.read_image() {
            let fingerprint = fingerprint(b'i', &image.rgba);
            if self.last_seen.as_deref() == Some(fingerprint.as_slice()) {
                return false;
            }
            self.last_seen = Some(fingerprint);
            return match self.ingest_image(&image) {
                Ok(added) => added,
                Err(error) => {
                    warn!(%error, "failed to record clipboard image");
                    false
                }
            };
        }

        if let Some(text) = self.backend.read_text() {
            let fingerprint = fingerprint(b't', text.as_bytes());
            if self.last_seen.as_deref() == Some(fingerprint.as_slice()) {
                return false;
            }
            self.last_seen = Some(fingerprint);
            return self.ingest_text(&text);
        }
        false
    }

    /// Records copied text. Blank text and text already in the history are ignored.
    pub fn ingest_text(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if self
            .history
            .iter()
            .any(|entry| entry.kind == EntryKind::Text && entry.data == text)
        {
            return false;
        }

        self.history.insert(
            0,
            ClipboardEntry {
                kind: EntryKind::Text,
                data: text.to_string(),
                preview: make_preview(text),
                captured_at: Local::now(),
                image_path: None,
            },
        );
        self.trim_kind(EntryKind::Text);
        self.persist();
        true
    }

    /// Records a copied image unless it equals one of the most recent stored images.
    pub fn ingest_image(&mut self, image: &ClipboardImage) -> Result<bool, StoreError> {
        if image.width == 0
            || image.height == 0
            || image.rgba.len() != image.width * image.height * 4
        {
            return Err(StoreError::InvalidImage {
                width: image.width,
                height: image.height,
            });
        }

        let duplicate = self
            .history
            .iter()
            .filter(|entry| entry.kind == EntryKind::Image)
            .take(IMAGE_DEDUP_WINDOW)
            .filter_map(|entry| entry.image_path.as_deref())
            .any(|path| load_image(path).as_ref() == Some(image));
        if duplicate {
            return Ok(false);
        }

        let path = self.store_image(image)?;
        let now = Local::now();
        self.history.insert(
            0,
            ClipboardEntry {
                kind: EntryKind::Image,
                data: IMAGE_PLACEHOLDER.to_string(),
                preview: format!("Image (copied at {})", now.format("%H:%M:%S")),
                captured_at: now,
                image_path: Some(path),
            },
        );
        self.trim_kind(EntryKind::Image);
        self.persist();
        Ok(true)
    }

    /// Writes the current history on the calling thread once pending
    /// background writes are done.
    pub fn save(&self) -> Result<(), StoreError> {
        self.writer.flush();
        write_history(&self.history_path(), &self.cipher, &self.history)
    }

    /// Waits for scheduled background writes to finish.
    pub fn flush(&self) {
        self.writer.flush();
    }

    fn persist(&self) {
        self.writer.schedule(self.history.clone());
    }

    fn load_history(&self) -> Vec<ClipboardEntry> {
        let path = self.history_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read clipboard history");
                return Vec::new();
            }
        };

        let records = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "clipboard history is not a JSON array; starting empty");
                return Vec::new();
            }
        };

        records
            .into_iter()
            .filter_map(|value| match self.decode_record(value) {
                Some(entry) => Some(entry),
                None => {
                    debug!("skipping malformed clipboard record");
                    None
                }
            })
            .collect()
    }

    fn decode_record(&self, value: serde_json::Value) -> Option<ClipboardEntry> {
        let record: StoredEntry = serde_json::from_value(value).ok()?;
        let data = self.cipher.decrypt(&BASE64.decode(record.d.as_bytes()).ok()?);
        let preview = self.cipher.decrypt(&BASE64.decode(record.p.as_bytes()).ok()?);
        let captured_at = parse_timestamp(&record.ts)?;
        let image_path = record.f.filter(|f| !f.is_empty()).map(PathBuf::from);
        if record.t == EntryKind::Image && image_path.is_none() {
            return None;
        }

        Some(ClipboardEntry {
            kind: record.t,
            data,
            preview,
            captured_at,
            image_path,
        })
    }

    fn store_image(&self, image: &ClipboardImage) -> Result<PathBuf, StoreError> {
        let buffer =
            image::RgbaImage::from_raw(image.width as u32, image.height as u32, image.rgba.clone())
                .ok_or(StoreError::InvalidImage {
                    width: image.width,
                    height: image.height,
                })?;

        let stamp = Local::now().timestamp_millis();
        let mut path = self.dir.join(format!("{stamp}.png"));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("{stamp}-{suffix}.png"));
            suffix += 1;
        }
        buffer.save_with_format(&path, image::ImageFormat::Png)?;
        Ok(path)
    }

    /// Keeps the newest `cap` entries of `kind`; other kinds are untouched.
    fn trim_kind(&mut self, kind: EntryKind) {
        let cap = match kind {
            EntryKind::Text => self.caps.text,
            EntryKind::Image => self.caps.image,
        };

        let mut seen = 0;
        let mut evicted_files = Vec::new();
        self.history.retain(|entry| {
            if entry.kind != kind {
                return true;
            }
            seen += 1;
            if seen <= cap {
                return true;
            }
            if let Some(path) = &entry.image_path {
                evicted_files.push(path.clone());
            }
            false
        });

        for path in evicted_files {
            if let Err(error) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), %error, "failed to delete evicted clipboard image");
            }
        }
    }

    fn to_item(entry: &ClipboardEntry) -> ResultItem {
        let icon = match &entry.image_path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => TEXT_ICON.to_string(),
        };
        ResultItem::from_owned(
            entry.preview.clone(),
            format_timestamp(&entry.captured_at),
            icon,
            entry.key(),
            TAG_CLIPBOARD.to_string(),
        )
    }
}

impl Provider for ClipboardStore {
    fn name(&self) -> &str {
        "Clipboard"
    }

    fn icon(&self) -> &str {
        "edit-copy"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError> {
        let Some(needle) = alias_remainder(query) else {
            return Ok(Vec::new());
        };

        Ok(self
            .history
            .iter()
            .filter(|entry| needle.is_empty() || entry.preview.to_lowercase().contains(&needle))
            .map(Self::to_item)
            .collect())
    }

    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError> {
        let entry = self
            .history
            .iter()
            .find(|entry| entry.key() == item.payload)
            .ok_or_else(|| ProviderError::ItemNotFound(item.title.clone()))?;

        match (&entry.kind, &entry.image_path) {
            (EntryKind::Image, Some(path)) => {
                let image = load_image(path).ok_or_else(|| {
                    ProviderError::Clipboard(format!("cannot decode {}", path.display()))
                })?;
                self.backend
                    .write_image(&image)
                    .map_err(|error| ProviderError::Clipboard(error.to_string()))
            }
            _ => self
                .backend
                .write_text(&entry.data)
                .map_err(|error| ProviderError::Clipboard(error.to_string())),
        }
    }

    fn poll(&mut self) -> bool {
        self.poll_backend()
    }

    fn shutdown(&mut self) {
        self.persist();
        self.writer.flush();
    }
}

fn write_history(
    path: &Path,
    cipher: &HistoryCipher,
    entries: &[ClipboardEntry],
) -> Result<(), StoreError> {
    let records: Vec<StoredEntry> = entries
        .iter()
        .map(|entry| StoredEntry {
            t: entry.kind,
            d: BASE64.encode(cipher.encrypt(&entry.data)),
            p: BASE64.encode(cipher.encrypt(&entry.preview)),
            ts: format_timestamp(&entry.captured_at),
            f: entry
                .image_path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
        })
        .collect();
    let encoded = serde_json::to_string(&records)?;

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(path, encoded).map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }
    Ok(())
}

/// `Some(filter)` when the query addresses the clipboard, `None` otherwise.
fn alias_remainder(query: &str) -> Option<String> {
    let lowered = query.to_lowercase();
    for alias in ALIASES {
        if lowered == alias {
            return Some(String::new());
        }
        if let Some(rest) = lowered.strip_prefix(alias).and_then(|r| r.strip_prefix(' ')) {
            return Some(rest.trim().to_string());
        }
    }
    None
}

fn make_preview(text: &str) -> String {
    let first = text.lines().find(|line| !line.is_empty()).unwrap_or_default();
    if first.chars().count() > PREVIEW_CHARS {
        let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
        out.push_str("...");
        out
    } else {
        first.to_string()
    }
}

fn load_image(path: &Path) -> Option<ClipboardImage> {
    let decoded = image::open(path).ok()?.to_rgba8();
    Some(ClipboardImage {
        width: decoded.width() as usize,
        height: decoded.height() as usize,
        rgba: decoded.into_raw(),
    })
}

fn fingerprint(kind: u8, bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update([kind]);
    hasher.update(bytes);
    hasher.finalize().to_vec()
}

fn format_timestamp(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::{alias_remainder, make_preview, parse_timestamp};

    #[test]
    fn preview_uses_first_non_empty_line() {
        assert_eq!(make_preview("\n\nhello\nworld"), "hello");
        let long = "x".repeat(60);
        assert_eq!(make_preview(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(make_preview(&"y".repeat(50)), "y".repeat(50));
    }

    #[test]
    fn aliases_require_a_separator_or_exact_match() {
        assert_eq!(alias_remainder("clip"), Some(String::new()));
        assert_eq!(alias_remainder("CLIPBOARD"), Some(String::new()));
        assert_eq!(alias_remainder("clip Foo"), Some("foo".to_string()));
        assert_eq!(alias_remainder("clipboard bar"), Some("bar".to_string()));
        assert_eq!(alias_remainder("clipper"), None);
        assert_eq!(alias_remainder("firefox"), None);
    }

    #[test]
    fn timestamps_accept_offset_and_naive_forms() {
        assert!(parse_timestamp("2024-03-01T10:20:30+02:00").is_some());
        assert!(parse_timestamp("2024-03-01T10:20:30").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
