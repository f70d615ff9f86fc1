use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::model::{RawContentItem, SourceKind};

use super::{Connector, ConnectorStats, SourceConfig, item_id, passes_keyword_filters};

/// The shape assumed of every external source's JSON response. Parsing the
/// vendor-specific envelope around this is out-of-scope per-source I/O
/// detail; this is the normalized contract every connector kind is expected
/// to expose to the core.
#[derive(Debug, Deserialize)]
struct WireItem {
    title: String,
    body: String,
    url: String,
    author: Option<String>,
    published_at: chrono::DateTime<Utc>,
    score: Option<f64>,
    comments: Option<u64>,
    shares: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    items: Vec<WireItem>,
}

/// One reqwest-backed adapter shared by all five connector kinds; the
/// per-kind behavior lives entirely in `SourceConfig::endpoints`.
pub struct HttpConnector {
    client: reqwest::Client,
    kind: SourceKind,
    name: String,
    config: SourceConfig,
    include_keywords: Vec<String>,
    exclude_keywords: Vec<String>,
    fetch_timeout: Duration,
    source_priority: u8,
    source_credibility: f64,
    stats: Mutex<ConnectorStats>,
}

impl HttpConnector {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: SourceKind,
        name: impl Into<String>,
        config: SourceConfig,
        include_keywords: Vec<String>,
        exclude_keywords: Vec<String>,
        fetch_timeout: Duration,
        source_priority: u8,
        source_credibility: f64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            kind,
            name: name.into(),
            config,
            include_keywords,
            exclude_keywords,
            fetch_timeout,
            source_priority,
            source_credibility,
            stats: Mutex::new(ConnectorStats::default()),
        }
    }

    async fn fetch_endpoint(&self, endpoint: &str, limit: usize) -> anyhow::Result<Vec<RawContentItem>> {
        let response = self
            .client
            .get(endpoint)
            .timeout(self.fetch_timeout)
            .send()
            .await?
            .error_for_status()?;
        let payload: WirePayload = response.json().await?;

        let now = Utc::now();
        let items = payload
            .items
            .into_iter()
            .filter(|item| passes_keyword_filters(&item.title, &item.body, &self.include_keywords, &self.exclude_keywords))
            .take(limit)
            .map(|item| {
                let content_hash = crate::util::text::hash_text(&format!(
                    "{}{}",
                    item.title.to_lowercase(),
                    item.body.to_lowercase().chars().take(500).collect::<String>()
                ));
                RawContentItem {
                    id: item_id(self.kind, &item.url),
                    source_kind: self.kind,
                    source_name: self.name.clone(),
                    title: item.title,
                    body: item.body,
                    url: Some(item.url),
                    author: item.author,
                    published_at: item.published_at,
                    fetched_at: now,
                    score: item.score,
                    comment_count: item.comments,
                    share_count: item.shares,
                    source_priority: self.source_priority,
                    source_credibility: self.source_credibility,
                    content_hash,
                    embedding: None,
                    categories: Vec::new(),
                }
            })
            .collect();

        Ok(items)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, limit: usize) -> Vec<RawContentItem> {
        let mut collected = Vec::new();
        for endpoint in self.config.endpoints() {
            match self.fetch_endpoint(&endpoint, limit.saturating_sub(collected.len())).await {
                Ok(mut items) => collected.append(&mut items),
                Err(error) => {
                    warn!(source = %self.name, endpoint = %endpoint, error = %error, "connector fetch failed");
                    let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
                    stats.error_count += 1;
                    stats.last_error = Some(error.to_string());
                }
            }
            if collected.len() >= limit {
                break;
            }
        }
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).fetch_count += 1;
        collected.truncate(limit);
        collected
    }

    async fn fetch_comments(&self, _item_id: &str, _limit: usize) -> Option<Vec<String>> {
        None
    }

    fn stats(&self) -> ConnectorStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::RssConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(server: &MockServer) -> HttpConnector {
        HttpConnector::new(
            SourceKind::Rss,
            "test-feed",
            SourceConfig::Rss(RssConfig {
                feed_urls: vec![format!("{}/feed", server.uri())],
            }),
            vec![],
            vec![],
            Duration::from_secs(5),
            10,
            1.0,
        )
    }

    #[tokio::test]
    async fn fetch_returns_items_honouring_limit() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "items": [
                {"title": "a", "body": "b", "url": "https://x/1", "published_at": "2026-01-01T00:00:00Z"},
                {"title": "c", "body": "d", "url": "https://x/2", "published_at": "2026-01-01T00:00:00Z"},
            ]
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let items = connector(&server).fetch(1).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_kind, SourceKind::Rss);
    }

    #[tokio::test]
    async fn fetch_on_error_returns_empty_and_records_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let connector = connector(&server);
        let items = connector.fetch(10).await;
        assert!(items.is_empty());
        assert_eq!(connector.stats().error_count, 1);
        assert!(connector.stats().last_error.is_some());
    }
}
