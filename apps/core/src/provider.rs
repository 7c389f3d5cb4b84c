use thiserror::Error;

use crate::action_executor::LaunchError;
use crate::model::ResultItem;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("launch error: {0}")]
    Launch(#[from] LaunchError),
    #[error("clipboard error: {0}")]
    Clipboard(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("{0}")]
    Other(String),
}

/// A source of results. Implementations rank their own items; the dispatcher
/// never reorders across providers.
pub trait Provider: Send {
    fn name(&self) -> &str;
    fn icon(&self) -> &str;
    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError>;
    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError>;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Pulls changes from outside the launcher. `true` when results may differ.
    fn poll(&mut self) -> bool {
        false
    }

    /// Rebuilds any cached catalog and returns its new size.
    fn refresh(&mut self) -> usize {
        0
    }

    /// Flush persistent state and release background work.
    fn shutdown(&mut self) {}
}
