use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::model::{truncate_with_ellipsis, ResultItem, TAG_SEARCH};

pub const API_PAGE_SIZE: usize = 10;
const DESCRIPTION_LIMIT: usize = 80;
const DESCRIPTION_KEEP: usize = 77;
const API_ITEM_ICON: &str = "applications-development";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request aborted")]
    Aborted,
}

impl From<reqwest::Error> for NetworkError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// The single HTTP operation remote search needs.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<String, NetworkError>;
}

pub struct ReqwestApiClient {
    client: reqwest::Client,
}

impl ReqwestApiClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, NetworkError> {
        Self::new(Duration::from_secs(cfg.http_timeout_secs), &cfg.user_agent)
    }
}

#[async_trait]
impl ApiClient for ReqwestApiClient {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<String, NetworkError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Response layouts of the registries we query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiShape {
    /// `objects[].package.{name,version,description}`, `objects[].downloads.monthly`
    Npm,
    /// `crates[].{name,max_version,description,downloads}`
    Crates,
    /// `items[].{full_name,description,html_url,stargazers_count}`
    GitHub,
}

/// Turns a response body into result items. Bodies that do not parse, or do
/// not have the expected layout, yield nothing.
pub fn parse_results(shape: ApiShape, body: &str, page_size: usize) -> Vec<ResultItem> {
    let Ok(doc) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    if !doc.is_object() {
        return Vec::new();
    }

    let (list, build): (&str, fn(&Value) -> Option<ResultItem>) = match shape {
        ApiShape::Npm => ("objects", npm_item),
        ApiShape::Crates => ("crates", crate_item),
        ApiShape::GitHub => ("items", github_item),
    };

    doc.get(list)
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(build).take(page_size).collect())
        .unwrap_or_default()
}

fn npm_item(entry: &Value) -> Option<ResultItem> {
    let package = entry.get("package")?;
    let name = str_field(package, "name").filter(|n| !n.is_empty())?;
    let version = str_field(package, "version").unwrap_or_default();
    let downloads = entry
        .get("downloads")
        .and_then(|d| d.get("monthly"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Some(api_item(
        format!("{name} v{version}"),
        &format!("{downloads} downloads"),
        str_field(package, "description").unwrap_or_default(),
        format!("https://www.npmjs.com/package/{name}"),
    ))
}

fn crate_item(entry: &Value) -> Option<ResultItem> {
    let name = str_field(entry, "name").filter(|n| !n.is_empty())?;
    let version = str_field(entry, "max_version").unwrap_or_default();
    let downloads = entry.get("downloads").and_then(Value::as_u64).unwrap_or(0);

    Some(api_item(
        format!("{name} v{version}"),
        &format!("{downloads} downloads"),
        str_field(entry, "description").unwrap_or_default(),
        format!("https://crates.io/crates/{name}"),
    ))
}

fn github_item(entry: &Value) -> Option<ResultItem> {
    let name = str_field(entry, "full_name").filter(|n| !n.is_empty())?;
    let url = str_field(entry, "html_url").unwrap_or_default();
    let stars = entry
        .get("stargazers_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Some(api_item(
        name.to_string(),
        &format!("★ {stars}"),
        str_field(entry, "description").unwrap_or_default(),
        url.to_string(),
    ))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn api_item(title: String, metric: &str, description: &str, url: String) -> ResultItem {
    let description =
        truncate_with_ellipsis(description.trim(), DESCRIPTION_LIMIT, DESCRIPTION_KEEP);
    ResultItem::from_owned(
        title,
        format!("{metric} • {description}"),
        API_ITEM_ICON.to_string(),
        url,
        TAG_SEARCH.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_results, ApiShape, API_PAGE_SIZE};

    #[test]
    fn npm_shape_reads_nested_package_and_downloads() {
        let body = r#"{"objects":[{"package":{"name":"react","version":"18.2.0","description":"UI library"},"downloads":{"monthly":1200}}]}"#;
        let items = parse_results(ApiShape::Npm, body, API_PAGE_SIZE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "react v18.2.0");
        assert_eq!(items[0].subtitle, "1200 downloads • UI library");
        assert_eq!(items[0].payload, "https://www.npmjs.com/package/react");
        assert_eq!(items[0].provider_tag, "search");
    }

    #[test]
    fn crates_shape_uses_max_version() {
        let body = r#"{"crates":[{"name":"serde","max_version":"1.0.228","description":null,"downloads":42}]}"#;
        let items = parse_results(ApiShape::Crates, body, API_PAGE_SIZE);
        assert_eq!(items[0].title, "serde v1.0.228");
        assert_eq!(items[0].subtitle, "42 downloads • ");
        assert_eq!(items[0].payload, "https://crates.io/crates/serde");
    }

    #[test]
    fn github_shape_reports_stars_and_truncates_descriptions() {
        let long = "d".repeat(120);
        let body = format!(
            r#"{{"items":[{{"full_name":"rust-lang/rust","description":"{long}","html_url":"https://github.com/rust-lang/rust","stargazers_count":9000}}]}}"#
        );
        let items = parse_results(ApiShape::GitHub, &body, API_PAGE_SIZE);
        assert_eq!(items[0].title, "rust-lang/rust");
        assert_eq!(items[0].subtitle, format!("★ 9000 • {}...", "d".repeat(77)));
        assert_eq!(items[0].payload, "https://github.com/rust-lang/rust");
    }

    #[test]
    fn results_are_capped_to_page_size() {
        let entries: Vec<String> = (0..15)
            .map(|i| format!(r#"{{"name":"c{i}","max_version":"0.1.0","downloads":1}}"#))
            .collect();
        let body = format!(r#"{{"crates":[{}]}}"#, entries.join(","));
        assert_eq!(parse_results(ApiShape::Crates, &body, API_PAGE_SIZE).len(), 10);
    }

    #[test]
    fn unexpected_bodies_yield_nothing() {
        assert!(parse_results(ApiShape::Npm, "not json", 10).is_empty());
        assert!(parse_results(ApiShape::Npm, "[1,2]", 10).is_empty());
        assert!(parse_results(ApiShape::GitHub, r#"{"message":"rate limited"}"#, 10).is_empty());
    }
}
