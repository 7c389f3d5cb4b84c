use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR_NAME: &str = ".kestrel";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub debounce_ms: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub cache_max_entries: usize,
    pub cache_expire_hours: u64,
    pub clipboard_enabled: bool,
    pub clipboard_text_cap: usize,
    pub clipboard_image_cap: usize,
    pub clipboard_poll_ms: u64,
    pub app_result_limit: usize,
    pub system_result_limit: usize,
    pub extra_application_dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: stable_app_data_dir(),
            debounce_ms: 200,
            http_timeout_secs: 10,
            user_agent: "kestrel-launcher/1.0".to_string(),
            cache_max_entries: 250,
            cache_expire_hours: 24,
            clipboard_enabled: true,
            clipboard_text_cap: 500,
            clipboard_image_cap: 100,
            clipboard_poll_ms: 500,
            app_result_limit: 8,
            system_result_limit: 6,
            extra_application_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Same defaults, rooted somewhere other than the home directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir().join("search.json")
    }

    pub fn clipboard_dir(&self) -> PathBuf {
        self.data_dir.join("clipboard")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Reads the config at `path`, or at the default location when `None`.
/// A missing file yields defaults rooted next to it.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default().config_path(),
    };

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            let mut cfg = Config::default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                cfg.data_dir = parent.to_path_buf();
            }
            return Ok(cfg);
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let cfg: Config = toml::from_str(&raw)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    let path = cfg.config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
    }
    let encoded = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, encoded).map_err(|source| ConfigError::Write { path, source })
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("data_dir is required".into()));
    }
    if !(10..=5_000).contains(&cfg.debounce_ms) {
        return Err(ConfigError::Invalid("debounce_ms out of range".into()));
    }
    if cfg.http_timeout_secs == 0 {
        return Err(ConfigError::Invalid("http_timeout_secs must be positive".into()));
    }
    if cfg.cache_max_entries == 0 || cfg.cache_expire_hours == 0 {
        return Err(ConfigError::Invalid("cache limits must be positive".into()));
    }
    if cfg.clipboard_text_cap == 0 || cfg.clipboard_image_cap == 0 {
        return Err(ConfigError::Invalid("clipboard caps must be positive".into()));
    }
    if !(1..=100).contains(&cfg.app_result_limit) || !(1..=100).contains(&cfg.system_result_limit)
    {
        return Err(ConfigError::Invalid("result limits out of range".into()));
    }
    Ok(())
}
