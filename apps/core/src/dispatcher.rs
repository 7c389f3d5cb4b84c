use thiserror::Error;
use tracing::{debug, info, warn};

use crate::contract::{
    ActivateResponse, CoreRequest, CoreResponse, RefreshResponse, SearchResponse,
};
use crate::model::ResultItem;
use crate::provider::{Provider, ProviderError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no result at index {0}")]
    ItemNotFound(usize),
    #[error("{provider} failed: {source}")]
    Provider {
        provider: String,
        source: ProviderError,
    },
}

/// Ordered providers plus the merged list of the last query, each item
/// remembering which provider produced it.
#[derive(Default)]
pub struct Dispatcher {
    providers: Vec<Box<dyn Provider>>,
    last_results: Vec<(ResultItem, usize)>,
    last_query: String,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        info!(provider = provider.name(), "provider registered");
        self.providers.push(provider);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    pub fn last_results(&self) -> impl Iterator<Item = &ResultItem> {
        self.last_results.iter().map(|(item, _)| item)
    }

    /// Asks every enabled provider in registration order and concatenates what
    /// they return. A failing provider contributes nothing.
    pub fn search(&mut self, query: &str) -> Vec<ResultItem> {
        let mut merged = Vec::new();
        for (index, provider) in self.providers.iter_mut().enumerate() {
            if !provider.is_enabled() {
                continue;
            }
            match provider.search(query) {
                Ok(items) => merged.extend(items.into_iter().map(|item| (item, index))),
                Err(error) => {
                    warn!(provider = provider.name(), %error, "provider search failed");
                }
            }
        }

        debug!(query, count = merged.len(), "query dispatched");
        self.last_query = query.to_string();
        self.last_results = merged;
        self.last_results.iter().map(|(item, _)| item.clone()).collect()
    }

    /// Executes result `index` of the last merged list on the provider that produced it.
    pub fn activate(&mut self, index: usize) -> Result<(), ServiceError> {
        if self.last_results.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "nothing to activate; run a search first".into(),
            ));
        }
        let (item, owner) = self
            .last_results
            .get(index)
            .cloned()
            .ok_or(ServiceError::ItemNotFound(index))?;
        let provider = self
            .providers
            .get_mut(owner)
            .ok_or(ServiceError::ItemNotFound(index))?;

        info!(provider = provider.name(), title = %item.title, "activating result");
        provider
            .execute(&item)
            .map_err(|source| ServiceError::Provider {
                provider: provider.name().to_string(),
                source,
            })
    }

    /// Gives every provider a chance to pick up external changes.
    pub fn poll(&mut self) -> bool {
        self.providers
            .iter_mut()
            .filter(|p| p.is_enabled())
            .fold(false, |changed, p| p.poll() || changed)
    }

    pub fn refresh(&mut self) -> usize {
        self.providers.iter_mut().map(|p| p.refresh()).sum()
    }

    pub fn shutdown(&mut self) {
        for provider in &mut self.providers {
            provider.shutdown();
        }
        info!("providers shut down");
    }

    pub fn handle_command(&mut self, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
        match request {
            CoreRequest::Search(request) => {
                let results = self.search(&request.query);
                Ok(CoreResponse::Search(SearchResponse::new(
                    &request.query,
                    results,
                )))
            }
            CoreRequest::Activate(request) => {
                self.activate(request.index)?;
                Ok(CoreResponse::Activate(ActivateResponse { activated: true }))
            }
            CoreRequest::RefreshApps => Ok(CoreResponse::RefreshApps(RefreshResponse {
                indexed: self.refresh(),
            })),
        }
    }
}
