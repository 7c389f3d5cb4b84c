use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{ResultItem, TAG_SEARCH};

pub const MAX_CACHE_ENTRIES: usize = 250;
pub const CACHE_EXPIRE_HOURS: u64 = 24;
const CACHED_ITEM_ICON: &str = "applications-development";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode cache: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub namespace: String,
    pub query: String,
    /// Seconds since the Unix epoch.
    pub refreshed_at: u64,
    pub results: Vec<ResultItem>,
}

/// `[title, subtitle, payload]` on disk.
type StoredItem = (String, String, String);
/// `[namespace, query, epochSeconds, items]` on disk.
type StoredEntry = (String, String, i64, Vec<StoredItem>);

pub type SharedCache = Arc<Mutex<SearchCache>>;

/// Remote search results keyed by `namespace:query`, bounded by age and count.
pub struct SearchCache {
    path: Option<PathBuf>,
    entries: HashMap<String, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
}

pub fn cache_key(namespace: &str, query: &str) -> String {
    format!("{namespace}:{query}")
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl SearchCache {
    pub fn in_memory(max_entries: usize, ttl: Duration) -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::load(
            &cfg.cache_file(),
            cfg.cache_max_entries,
            Duration::from_secs(cfg.cache_expire_hours * 3600),
        )
    }

    /// Reads `path` if it exists. Unreadable files and malformed records are
    /// skipped; the result is pruned to `max_entries`.
    pub fn load(path: &Path, max_entries: usize, ttl: Duration) -> Self {
        let mut cache = Self::in_memory(max_entries, ttl);
        cache.path = Some(path.to_path_buf());

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return cache,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read search cache");
                return cache;
            }
        };

        let object = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(_) => {
                warn!(path = %path.display(), "search cache is not a JSON object");
                return cache;
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse search cache");
                return cache;
            }
        };

        for (key, value) in object {
            let Ok((namespace, query, stamp, items)) = serde_json::from_value::<StoredEntry>(value)
            else {
                debug!(%key, "skipping malformed cache record");
                continue;
            };
            let Ok(refreshed_at) = u64::try_from(stamp) else {
                continue;
            };
            let results = items
                .into_iter()
                .map(|(title, subtitle, payload)| {
                    ResultItem::from_owned(
                        title,
                        subtitle,
                        CACHED_ITEM_ICON.to_string(),
                        payload,
                        TAG_SEARCH.to_string(),
                    )
                })
                .collect();
            cache.entries.insert(
                cache_key(&namespace, &query),
                CacheEntry {
                    namespace,
                    query,
                    refreshed_at,
                    results,
                },
            );
        }

        while cache.entries.len() > cache.max_entries {
            cache.evict_oldest();
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, namespace: &str, query: &str) -> bool {
        self.entries.contains_key(&cache_key(namespace, query))
    }

    pub fn get(&mut self, namespace: &str, query: &str) -> Option<Vec<ResultItem>> {
        self.get_at(namespace, query, now_secs())
    }

    /// Expired entries are removed on the way out.
    pub fn get_at(&mut self, namespace: &str, query: &str, now: u64) -> Option<Vec<ResultItem>> {
        let key = cache_key(namespace, query);
        let entry = self.entries.get(&key)?;
        if now.saturating_sub(entry.refreshed_at) < self.ttl.as_secs() {
            return Some(entry.results.clone());
        }
        self.entries.remove(&key);
        None
    }

    pub fn insert(&mut self, namespace: &str, query: &str, results: Vec<ResultItem>) {
        self.insert_at(namespace, query, results, now_secs());
    }

    /// Empty result lists are not cached.
    pub fn insert_at(&mut self, namespace: &str, query: &str, results: Vec<ResultItem>, now: u64) {
        if results.is_empty() {
            return;
        }
        self.entries.insert(
            cache_key(namespace, query),
            CacheEntry {
                namespace: namespace.to_string(),
                query: query.to_string(),
                refreshed_at: now,
                results,
            },
        );
        if self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let stored: BTreeMap<&str, StoredEntry> = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let items = entry
                    .results
                    .iter()
                    .map(|item| {
                        (
                            item.title.clone(),
                            item.subtitle.clone(),
                            item.payload.clone(),
                        )
                    })
                    .collect();
                (
                    key.as_str(),
                    (
                        entry.namespace.clone(),
                        entry.query.clone(),
                        i64::try_from(entry.refreshed_at).unwrap_or(i64::MAX),
                        items,
                    ),
                )
            })
            .collect();
        let encoded = serde_json::to_string(&stored)?;

        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, encoded).map_err(io_err)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by(|a, b| a.1.refreshed_at.cmp(&b.1.refreshed_at).then_with(|| a.0.cmp(b.0)))
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!(%key, "evicting oldest search cache entry");
            self.entries.remove(&key);
        }
    }
}
