//! Aggregation manager. Fans out across connectors, deduplicates, ranks.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::connectors::Connector;
use crate::model::RawContentItem;

#[async_trait]
pub(crate) trait AggregationStage: Send + Sync {
    async fn fetch_all(&self, limit_per_source: usize) -> Vec<RawContentItem>;
}

pub(crate) struct ConcurrentAggregationManager {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConcurrentAggregationManager {
    pub(crate) fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }
}

#[async_trait]
impl AggregationStage for ConcurrentAggregationManager {
    async fn fetch_all(&self, limit_per_source: usize) -> Vec<RawContentItem> {
        if self.connectors.is_empty() {
            warn!("aggregation: no active connectors configured");
            return Vec::new();
        }

        let fetches = self.connectors.iter().map(|connector| {
            let connector = Arc::clone(connector);
            async move { connector.fetch(limit_per_source).await }
        });
        let fetched: Vec<Vec<RawContentItem>> = join_all(fetches).await;
        let items: Vec<RawContentItem> = fetched.into_iter().flatten().collect();

        let deduped = dedupe(items);
        let mut ranked = deduped;
        ranked.sort_by(|a, b| rank(b).partial_cmp(&rank(a)).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Drops items whose URL was already seen, then items whose first-50-char
/// lowercase-stripped title was already seen, and attaches each survivor's
/// content hash. First source wins ties.
fn dedupe(items: Vec<RawContentItem>) -> Vec<RawContentItem> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(items.len());

    for mut item in items {
        if let Some(url) = &item.url {
            if !seen_urls.insert(url.clone()) {
                continue;
            }
        }
        let title_key: String = item.title.trim().to_lowercase().chars().take(50).collect();
        if !seen_titles.insert(title_key) {
            continue;
        }

        let body_prefix: String = item.body.to_lowercase().chars().take(500).collect();
        item.content_hash = crate::util::text::hash_text(&format!("{}{}", item.title.to_lowercase(), body_prefix));
        out.push(item);
    }

    out
}

fn rank(item: &RawContentItem) -> f64 {
    item.weighted_rank()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use chrono::{TimeZone, Utc};

    fn item(id: &str, url: &str, title: &str, score: f64, comments: u64) -> RawContentItem {
        RawContentItem {
            id: id.into(),
            source_kind: SourceKind::Rss,
            source_name: "feed".into(),
            title: title.into(),
            body: "body".into(),
            url: Some(url.into()),
            author: None,
            published_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            fetched_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            score: Some(score),
            comment_count: Some(comments),
            share_count: None,
            source_priority: 10,
            source_credibility: 1.0,
            content_hash: 0,
            embedding: None,
            categories: vec![],
        }
    }

    #[test]
    fn dedupe_drops_repeated_urls_keeping_first() {
        let items = vec![
            item("a", "https://x/1", "First", 1.0, 0),
            item("b", "https://x/1", "Second", 2.0, 0),
        ];
        let out = dedupe(items);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn dedupe_drops_repeated_title_prefixes() {
        let items = vec![
            item("a", "https://x/1", "Same Title Here", 1.0, 0),
            item("b", "https://x/2", "same title here", 2.0, 0),
        ];
        let out = dedupe(items);
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn fetch_all_with_zero_connectors_returns_empty() {
        let manager = ConcurrentAggregationManager::new(vec![]);
        let out = manager.fetch_all(10).await;
        assert!(out.is_empty());
    }

    #[test]
    fn rank_weighs_comments_double_score() {
        let a = item("a", "https://x/1", "A", 0.0, 10);
        let b = item("b", "https://x/2", "B", 15.0, 0);
        assert_eq!(rank(&a), rank(&b));
    }
}
