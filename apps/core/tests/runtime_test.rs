use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kestrel_core::contract::CoreResponse;
use kestrel_core::dispatcher::Dispatcher;
use kestrel_core::runtime::handle_remote_event;
use kestrel_core::transport::TransportResponse;
use kestrel_core::web_api::{ApiClient, NetworkError};
use kestrel_core::web_search::{RemoteEvent, WebSearchProvider, DEFAULT_DEBOUNCE};
use kestrel_core::web_search_cache::{SearchCache, SharedCache};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

const CRATES_BODY: &str = r#"{"crates":[
    {"name":"serde","max_version":"1.0.200","description":"Serialization framework","downloads":900}
]}"#;

struct FixedClient;

#[async_trait]
impl ApiClient for FixedClient {
    async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<String, NetworkError> {
        Ok(CRATES_BODY.to_string())
    }
}

fn dispatcher_with_web_search() -> (Dispatcher, mpsc::UnboundedReceiver<RemoteEvent>) {
    let cache: SharedCache = Arc::new(Mutex::new(SearchCache::in_memory(
        250,
        Duration::from_secs(24 * 3600),
    )));
    let (tx, rx) = mpsc::unbounded_channel();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Box::new(WebSearchProvider::new(
        Handle::current(),
        Arc::new(FixedClient),
        cache,
        tx,
        DEFAULT_DEBOUNCE,
    )));
    (dispatcher, rx)
}

#[tokio::test(start_paused = true)]
async fn arrival_for_the_shown_query_emits_an_update() {
    let (mut dispatcher, mut events) = dispatcher_with_web_search();
    assert_eq!(dispatcher.search("cargo serde").len(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let event = events.recv().await.unwrap();
    let line = handle_remote_event(&mut dispatcher, event).unwrap();
    assert!(!line.contains('\n'));

    match serde_json::from_str::<TransportResponse>(&line).unwrap() {
        TransportResponse::Ok {
            response: CoreResponse::ResultsUpdated(update),
        } => {
            assert_eq!(update.query, "cargo serde");
            let titles: Vec<&str> = update.results.iter().map(|r| r.title.as_str()).collect();
            assert_eq!(titles, vec!["Search Cargo: serde", "serde v1.0.200"]);
            assert_eq!(update.results[1].payload, "https://crates.io/crates/serde");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(dispatcher.last_results().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn arrival_for_a_query_no_longer_shown_is_ignored() {
    let (mut dispatcher, mut events) = dispatcher_with_web_search();
    dispatcher.search("cargo serde");
    tokio::time::sleep(Duration::from_millis(500)).await;
    let event = events.recv().await.unwrap();

    dispatcher.search("g serde");
    assert!(handle_remote_event(&mut dispatcher, event).is_none());
    assert_eq!(dispatcher.last_query(), "g serde");
    assert_eq!(dispatcher.last_results().count(), 1);
}

#[tokio::test]
async fn stale_event_before_any_search_is_ignored() {
    let (mut dispatcher, _events) = dispatcher_with_web_search();
    let event = RemoteEvent::ResultsReady {
        query: "npm react".to_string(),
    };
    assert!(handle_remote_event(&mut dispatcher, event).is_none());
}
