use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::action_registry::SystemCommandProvider;
use crate::calculator::CalculatorProvider;
use crate::clipboard_backend::{MemoryClipboard, SharedClipboard, SystemClipboard};
use crate::clipboard_history::ClipboardStore;
use crate::config::{self, Config, ConfigError};
use crate::contract::{CoreResponse, SearchResponse};
use crate::discovery::ApplicationIndex;
use crate::dispatcher::Dispatcher;
use crate::logging;
use crate::time_conversion::TimeProvider;
use crate::transport::{self, TransportResponse};
use crate::web_api::{ApiClient, NetworkError, ReqwestApiClient};
use crate::web_search::{RemoteEvent, WebSearchProvider};
use crate::web_search_cache::SearchCache;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http client error: {0}")]
    Network(#[from] NetworkError),
    #[error("{0}")]
    InvalidArgs(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    /// Keep clipboard state in process instead of touching the desktop clipboard.
    pub memory_clipboard: bool,
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, RuntimeError> {
    let mut options = RuntimeOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| RuntimeError::InvalidArgs("--config needs a path".into()))?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--memory-clipboard" => options.memory_clipboard = true,
            other => {
                return Err(RuntimeError::InvalidArgs(format!(
                    "unknown argument '{other}' (expected --config <path> or --memory-clipboard)"
                )))
            }
        }
    }
    Ok(options)
}

pub fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config_path.as_deref())?;
    if !config.config_path().exists() {
        config::save(&config)?;
    }
    let _log_guard = logging::init(&config)?;
    info!(
        config_path = %config.config_path().display(),
        data_dir = %config.data_dir.display(),
        "startup"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, options))
}

/// Registers every provider in result order: web search, clipboard,
/// applications, calculator, time, system commands.
pub fn build_dispatcher(
    cfg: &Config,
    runtime: Handle,
    clipboard: SharedClipboard,
    client: Arc<dyn ApiClient>,
    events: UnboundedSender<RemoteEvent>,
) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    let cache = Arc::new(Mutex::new(SearchCache::from_config(cfg)));
    dispatcher.register(Box::new(WebSearchProvider::new(
        runtime,
        client,
        cache,
        events,
        Duration::from_millis(cfg.debounce_ms),
    )));

    match ClipboardStore::from_config(cfg, Arc::clone(&clipboard)) {
        Ok(store) => dispatcher.register(Box::new(store)),
        Err(error) => warn!(%error, "clipboard history unavailable"),
    }

    dispatcher.register(Box::new(ApplicationIndex::from_config(cfg)));
    dispatcher.register(Box::new(CalculatorProvider::new(Arc::clone(&clipboard))));
    dispatcher.register(Box::new(TimeProvider::new(clipboard)));
    dispatcher.register(Box::new(SystemCommandProvider::new(cfg.system_result_limit)));
    dispatcher
}

async fn serve(config: Config, options: RuntimeOptions) -> Result<(), RuntimeError> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let clipboard: SharedClipboard = if options.memory_clipboard {
        Arc::new(MemoryClipboard::new())
    } else {
        Arc::new(SystemClipboard::new())
    };
    let client: Arc<dyn ApiClient> = Arc::new(ReqwestApiClient::from_config(&config)?);
    let mut dispatcher =
        build_dispatcher(&config, Handle::current(), clipboard, client, events_tx);
    info!(providers = ?dispatcher.provider_names(), "dispatcher ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut poll = tokio::time::interval(Duration::from_millis(config.clipboard_poll_ms.max(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = transport::handle_json(&mut dispatcher, &line);
                write_line(&mut stdout, &reply).await?;
            }
            Some(event) = events_rx.recv() => {
                if let Some(update) = handle_remote_event(&mut dispatcher, event) {
                    write_line(&mut stdout, &update).await?;
                }
            }
            _ = poll.tick() => {
                dispatcher.poll();
            }
        }
    }

    dispatcher.shutdown();
    info!("stdin closed; shutting down");
    Ok(())
}

/// Re-runs the shown query when remote results for it arrive and returns the
/// `results_updated` line. Events for any other query yield `None`.
pub fn handle_remote_event(dispatcher: &mut Dispatcher, event: RemoteEvent) -> Option<String> {
    let RemoteEvent::ResultsReady { query } = event;
    if query != dispatcher.last_query() {
        debug!(%query, "remote results for a query no longer shown");
        return None;
    }
    let results = dispatcher.search(&query);
    let update = TransportResponse::Ok {
        response: CoreResponse::ResultsUpdated(SearchResponse::new(&query, results)),
    };
    Some(transport::encode(&update))
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> Result<(), std::io::Error> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
