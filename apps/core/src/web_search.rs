use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action_executor::open_url;
use crate::model::{ResultItem, TAG_SEARCH};
use crate::provider::{Provider, ProviderError};
use crate::web_api::{parse_results, ApiClient, ApiShape, API_PAGE_SIZE};
use crate::web_search_cache::SharedCache;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Everything but RFC 3986 unreserved characters, so spaces become `%20`.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub url_template: &'static str,
    pub shape: ApiShape,
    pub namespace: &'static str,
    pub accept: Option<&'static str>,
}

/// A web search shortcut. Templates carry `%1` where the encoded query goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchProvider {
    pub name: &'static str,
    pub shortcut: &'static str,
    pub icon: &'static str,
    pub url_template: &'static str,
    pub description: &'static str,
    pub api: Option<ApiEndpoint>,
}

impl SearchProvider {
    pub fn supports_api(&self) -> bool {
        self.api.is_some()
    }

    pub fn search_url(&self, query: &str) -> String {
        self.url_template.replace("%1", &encode_query(query))
    }

    fn landing_url(&self) -> String {
        self.url_template.replace("%1", "")
    }
}

const fn web(
    name: &'static str,
    shortcut: &'static str,
    icon: &'static str,
    url_template: &'static str,
    description: &'static str,
) -> SearchProvider {
    SearchProvider {
        name,
        shortcut,
        icon,
        url_template,
        description,
        api: None,
    }
}

pub const SEARCH_PROVIDERS: &[SearchProvider] = &[
    web(
        "Google",
        "g",
        "web-browser",
        "https://www.google.com/search?q=%1",
        "Search Google",
    ),
    web(
        "DuckDuckGo",
        "ddg",
        "web-browser",
        "https://duckduckgo.com/?q=%1",
        "Search DuckDuckGo",
    ),
    web(
        "Bing",
        "bing",
        "web-browser",
        "https://www.bing.com/search?q=%1",
        "Search Bing",
    ),
    web(
        "Yandex",
        "yandex",
        "web-browser",
        "https://yandex.com/search/?text=%1",
        "Search Yandex",
    ),
    SearchProvider {
        api: Some(ApiEndpoint {
            url_template: "https://registry.npmjs.org/-/v1/search?text=%1&size=10",
            shape: ApiShape::Npm,
            namespace: "npm",
            accept: None,
        }),
        ..web(
            "NPM",
            "npm",
            "applications-development",
            "https://www.npmjs.com/search?q=%1",
            "Search NPM packages",
        )
    },
    SearchProvider {
        api: Some(ApiEndpoint {
            url_template: "https://crates.io/api/v1/crates?q=%1&per_page=10",
            shape: ApiShape::Crates,
            namespace: "cargo",
            accept: None,
        }),
        ..web(
            "Cargo",
            "cargo",
            "applications-development",
            "https://crates.io/search?q=%1",
            "Search Rust crates",
        )
    },
    SearchProvider {
        api: Some(ApiEndpoint {
            url_template:
                "https://api.github.com/search/repositories?q=%1&sort=stars&order=desc&per_page=10",
            shape: ApiShape::GitHub,
            namespace: "github",
            accept: Some("application/vnd.github.v3+json"),
        }),
        ..web(
            "GitHub",
            "gh",
            "applications-development",
            "https://github.com/search?q=%1",
            "Search GitHub repositories",
        )
    },
    web(
        "PyPI",
        "pypi",
        "applications-development",
        "https://pypi.org/search/?q=%1",
        "Search Python packages",
    ),
    web(
        "Docker Hub",
        "docker",
        "applications-development",
        "https://hub.docker.com/search?q=%1",
        "Search Docker images",
    ),
    web(
        "MDN",
        "mdn",
        "text-html",
        "https://developer.mozilla.org/en-US/search?q=%1",
        "Search MDN Web Docs",
    ),
    web(
        "Stack Overflow",
        "so",
        "applications-development",
        "https://stackoverflow.com/search?q=%1",
        "Search Stack Overflow",
    ),
    web(
        "Reddit",
        "reddit",
        "internet-web-browser",
        "https://www.reddit.com/search/?q=%1",
        "Search Reddit",
    ),
    web(
        "YouTube",
        "yt",
        "applications-multimedia",
        "https://www.youtube.com/results?search_query=%1",
        "Search YouTube",
    ),
    web(
        "Wikipedia",
        "wiki",
        "accessories-dictionary",
        "https://en.wikipedia.org/wiki/Special:Search/%1",
        "Search Wikipedia",
    ),
    web(
        "Arch AUR",
        "aur",
        "applications-system",
        "https://aur.archlinux.org/packages/?K=%1",
        "Search Arch User Repository",
    ),
    web(
        "Debian Packages",
        "deb",
        "applications-system",
        "https://packages.debian.org/search?keywords=%1",
        "Search Debian packages",
    ),
    web(
        "Homebrew",
        "brew",
        "applications-system",
        "https://formulae.brew.sh/formula/%1",
        "Search Homebrew packages",
    ),
    web(
        "Twitter",
        "tw",
        "internet-web-browser",
        "https://twitter.com/search?q=%1",
        "Search Twitter",
    ),
];

pub fn encode_query(query: &str) -> String {
    utf8_percent_encode(query, QUERY_ENCODE_SET).to_string()
}

/// The provider addressed by `<shortcut> <rest>` and the trimmed rest.
pub fn match_shortcut<'p>(
    providers: &'p [SearchProvider],
    query: &str,
) -> Option<(&'p SearchProvider, String)> {
    providers.iter().find_map(|provider| {
        let len = provider.shortcut.len();
        let head = query.get(..len)?;
        let rest = query.get(len..)?;
        if !head.eq_ignore_ascii_case(provider.shortcut) || !rest.starts_with(' ') {
            return None;
        }
        Some((provider, rest.trim().to_string()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Fresh results for `query` are cached; searching it again will show them.
    ResultsReady { query: String },
}

struct PendingRequest {
    query: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct RemoteRequest {
    client: Arc<dyn ApiClient>,
    cache: SharedCache,
    events: UnboundedSender<RemoteEvent>,
    debounce: Duration,
    endpoint: ApiEndpoint,
    url: String,
    rest: String,
    query: String,
}

/// Shortcut web searches with debounced, cancellable API lookups behind a cache.
pub struct WebSearchProvider {
    providers: &'static [SearchProvider],
    runtime: Handle,
    client: Arc<dyn ApiClient>,
    cache: SharedCache,
    events: UnboundedSender<RemoteEvent>,
    debounce: Duration,
    last_armed_query: Option<String>,
    pending: Option<PendingRequest>,
}

impl WebSearchProvider {
    pub fn new(
        runtime: Handle,
        client: Arc<dyn ApiClient>,
        cache: SharedCache,
        events: UnboundedSender<RemoteEvent>,
        debounce: Duration,
    ) -> Self {
        Self {
            providers: SEARCH_PROVIDERS,
            runtime,
            client,
            cache,
            events,
            debounce,
            last_armed_query: None,
            pending: None,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            pending.handle.abort();
            debug!(query = %pending.query, "remote search cancelled");
        }
        self.last_armed_query = None;
    }

    fn arm(&mut self, endpoint: ApiEndpoint, query: &str, rest: &str) {
        self.cancel_pending();

        let cancel = CancellationToken::new();
        let request = RemoteRequest {
            client: Arc::clone(&self.client),
            cache: Arc::clone(&self.cache),
            events: self.events.clone(),
            debounce: self.debounce,
            endpoint,
            url: endpoint.url_template.replace("%1", &encode_query(rest)),
            rest: rest.to_string(),
            query: query.to_string(),
        };
        let handle = self.runtime.spawn(run_remote_search(request, cancel.clone()));

        self.last_armed_query = Some(query.to_string());
        self.pending = Some(PendingRequest {
            query: query.to_string(),
            cancel,
            handle,
        });
    }
}

impl Provider for WebSearchProvider {
    fn name(&self) -> &str {
        "Web Search"
    }

    fn icon(&self) -> &str {
        "web-browser"
    }

    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError> {
        if self
            .last_armed_query
            .as_deref()
            .is_some_and(|armed| armed != query)
        {
            self.cancel_pending();
        }

        let Some((provider, rest)) = match_shortcut(self.providers, query) else {
            return Ok(Vec::new());
        };

        if rest.is_empty() {
            return Ok(vec![ResultItem::new(
                provider.name,
                provider.description,
                provider.icon,
                &provider.landing_url(),
                TAG_SEARCH,
            )]);
        }

        let mut results = vec![ResultItem::from_owned(
            format!("Search {}: {rest}", provider.name),
            provider.description.to_string(),
            provider.icon.to_string(),
            provider.search_url(&rest),
            TAG_SEARCH.to_string(),
        )];

        let Some(endpoint) = provider.api else {
            return Ok(results);
        };

        if let Some(cached) = self.cache.lock().get(endpoint.namespace, &rest) {
            results.extend(cached);
            return Ok(results);
        }

        // A finished request that left the cache empty failed or found nothing.
        let in_flight = self.last_armed_query.as_deref() == Some(query) && self.has_pending();
        if !in_flight {
            self.arm(endpoint, query, &rest);
        }
        Ok(results)
    }

    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError> {
        if item.provider_tag != TAG_SEARCH {
            return Err(ProviderError::ItemNotFound(item.title.clone()));
        }
        open_url(&item.payload)?;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.cancel_pending();
        if let Err(error) = self.cache.lock().save() {
            warn!(%error, "failed to save search cache on shutdown");
        }
    }
}

impl Drop for WebSearchProvider {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            pending.handle.abort();
        }
    }
}

async fn run_remote_search(request: RemoteRequest, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(request.debounce) => {}
    }

    let headers: Vec<(String, String)> = request
        .endpoint
        .accept
        .map(|accept| vec![("Accept".to_string(), accept.to_string())])
        .unwrap_or_default();

    debug!(url = %request.url, "remote search request");
    let body = tokio::select! {
        _ = cancel.cancelled() => return,
        response = request.client.get(&request.url, &headers) => response,
    };

    let body = match body {
        Ok(body) => body,
        Err(error) => {
            warn!(url = %request.url, %error, "remote search failed");
            return;
        }
    };
    if cancel.is_cancelled() {
        return;
    }

    let results = parse_results(request.endpoint.shape, &body, API_PAGE_SIZE);
    if results.is_empty() {
        debug!(url = %request.url, "remote search returned no usable results");
        return;
    }

    let count = results.len();
    {
        let mut cache = request.cache.lock();
        cache.insert(request.endpoint.namespace, &request.rest, results);
        if let Err(error) = cache.save() {
            warn!(%error, "failed to save search cache");
        }
    }
    info!(namespace = request.endpoint.namespace, count, "remote search results cached");
    let _ = request.events.send(RemoteEvent::ResultsReady {
        query: request.query,
    });
}
