use serde::{Deserialize, Serialize};

use crate::model::ResultItem;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultDto {
    pub title: String,
    pub subtitle: String,
    pub icon: String,
    pub payload: String,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ResultDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivateRequest {
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivateResponse {
    pub activated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    pub indexed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CoreRequest {
    Search(SearchRequest),
    Activate(ActivateRequest),
    RefreshApps,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CoreResponse {
    Search(SearchResponse),
    Activate(ActivateResponse),
    RefreshApps(RefreshResponse),
    /// Unsolicited: remote results arrived for the query currently shown.
    ResultsUpdated(SearchResponse),
}

impl From<ResultItem> for ResultDto {
    fn from(value: ResultItem) -> Self {
        Self {
            title: value.title,
            subtitle: value.subtitle,
            icon: value.icon,
            payload: value.payload,
            provider: value.provider_tag,
        }
    }
}

impl SearchResponse {
    pub fn new(query: &str, results: Vec<ResultItem>) -> Self {
        Self {
            query: query.to_string(),
            results: results.into_iter().map(ResultDto::from).collect(),
        }
    }
}
