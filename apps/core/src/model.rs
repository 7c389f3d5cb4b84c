use serde::{Deserialize, Serialize};

pub const TAG_APP: &str = "app";
pub const TAG_SEARCH: &str = "search";
pub const TAG_CLIPBOARD: &str = "clipboard";
pub const TAG_CALCULATOR: &str = "calculator";
pub const TAG_TIME: &str = "time";
pub const TAG_SYSTEM: &str = "system";

/// One row of a result list. `payload` is whatever the producing provider needs
/// to find or run the item again: a command line, a URL, a clipboard key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultItem {
    pub title: String,
    pub subtitle: String,
    pub icon: String,
    pub payload: String,
    pub provider_tag: String,
}

impl ResultItem {
    pub fn new(title: &str, subtitle: &str, icon: &str, payload: &str, provider_tag: &str) -> Self {
        Self::from_owned(
            title.to_string(),
            subtitle.to_string(),
            icon.to_string(),
            payload.to_string(),
            provider_tag.to_string(),
        )
    }

    pub fn from_owned(
        title: String,
        subtitle: String,
        icon: String,
        payload: String,
        provider_tag: String,
    ) -> Self {
        Self {
            title,
            subtitle,
            icon,
            payload,
            provider_tag,
        }
    }
}

/// Cuts `input` to `keep` characters plus `...` when it is longer than `limit` characters.
pub fn truncate_with_ellipsis(input: &str, limit: usize, keep: usize) -> String {
    if input.chars().count() <= limit {
        return input.to_string();
    }
    let mut out: String = input.chars().take(keep).collect();
    out.push_str("...");
    out
}
