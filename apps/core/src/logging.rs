use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "kestrel.log";

static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Keeps the non-blocking writer alive; dropping it flushes pending lines.
pub struct LogGuard {
    _worker: WorkerGuard,
}

pub fn logs_dir(cfg: &Config) -> PathBuf {
    cfg.logs_dir()
}

pub fn init(cfg: &Config) -> Result<LogGuard, std::io::Error> {
    let dir = logs_dir(cfg);
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, worker) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    install_panic_hook();
    Ok(LogGuard { _worker: worker })
}

fn install_panic_hook() {
    let _ = PANIC_HOOK_INSTALLED.get_or_init(|| {
        let prior = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let location = panic_info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let payload = panic_info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic payload unavailable".to_string());
            tracing::error!("panic at {location}: {payload}");
            prior(panic_info);
        }));
    });
}
