//! Source connectors. Per-source HTTP I/O internals are an external
//! collaborator boundary; what the core owns is the contract: honour
//! `limit`, filter on `title + body`, never raise past `fetch`, and attach a
//! stable content-hash id.

pub mod config;
pub mod http;

use async_trait::async_trait;

pub use config::{AggregatorBoardConfig, ForumConfig, NewsApiConfig, RssConfig, SourceConfig, VideoTranscriptsConfig};
pub use http::HttpConnector;

use crate::model::{RawContentItem, SourceKind};

#[derive(Debug, Clone, Default)]
pub struct ConnectorStats {
    pub fetch_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

/// A named, configured adapter over one external source.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn name(&self) -> &str;

    /// Never raises: on any failure returns an empty list, having recorded
    /// the error on `stats()`.
    async fn fetch(&self, limit: usize) -> Vec<RawContentItem>;

    /// Optional capability; connectors that don't support it return `None`.
    async fn fetch_comments(&self, item_id: &str, limit: usize) -> Option<Vec<String>>;

    fn stats(&self) -> ConnectorStats;
}

/// Builds a stable per-item id: `id = hash(sourceKind + url)`. Re-fetching
/// the same item from the same source always yields the same id.
#[must_use]
pub fn item_id(kind: SourceKind, url: &str) -> String {
    let hash = crate::util::text::hash_text(&format!("{}{url}", kind.as_str()));
    format!("{hash:016x}")
}

/// Keyword include/exclude filter applied inside each connector over
/// `title + body` before the item is returned.
#[must_use]
pub fn passes_keyword_filters(title: &str, body: &str, include: &[String], exclude: &[String]) -> bool {
    let haystack = format!("{title} {body}").to_lowercase();
    if !include.is_empty() && !include.iter().any(|kw| haystack.contains(&kw.to_lowercase())) {
        return false;
    }
    if exclude.iter().any(|kw| haystack.contains(&kw.to_lowercase())) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_is_deterministic_and_kind_sensitive() {
        let a = item_id(SourceKind::Rss, "https://example.com/1");
        let b = item_id(SourceKind::Rss, "https://example.com/1");
        let c = item_id(SourceKind::Forum, "https://example.com/1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn keyword_filter_requires_any_include_match() {
        assert!(passes_keyword_filters("Rust news", "body", &["rust".into()], &[]));
        assert!(!passes_keyword_filters("Go news", "body", &["rust".into()], &[]));
    }

    #[test]
    fn keyword_filter_rejects_excluded() {
        assert!(!passes_keyword_filters(
            "Rust news",
            "sponsored content",
            &[],
            &["sponsored".into()]
        ));
    }
}
