use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::SourceKind;

/// One piece of fetched content, produced by a connector and consumed by the
/// clusterer. Not persisted long-term; lives only for the duration of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContentItem {
    /// `hash(source_kind + url)`, stable and unique within one aggregation run.
    pub id: String,
    pub source_kind: SourceKind,
    pub source_name: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub comment_count: Option<u64>,
    pub share_count: Option<u64>,
    /// Carried from the owning `ContentSource` so the aggregation manager
    /// can rank without a second lookup.
    pub source_priority: u8,
    pub source_credibility: f64,
    /// `hash(lower(title) + lower(body[:500]))`, used by the Aggregation
    /// Manager's near-duplicate pass.
    pub content_hash: u64,
    pub embedding: Option<Vec<f32>>,
    pub categories: Vec<String>,
}

impl RawContentItem {
    /// `score + 2*comments`, the engagement numerator the weighted rank
    /// formula scales by source priority and credibility.
    #[must_use]
    pub fn raw_engagement(&self) -> f64 {
        self.score.unwrap_or(0.0) + 2.0 * self.comment_count.unwrap_or(0) as f64
    }

    /// `(score + 2*comments) * (sourcePriority/10) * sourceCredibility` —
    /// the weighted engagement rank used to order aggregated items.
    #[must_use]
    pub fn weighted_rank(&self) -> f64 {
        self.raw_engagement() * (f64::from(self.source_priority) / 10.0) * self.source_credibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(score: Option<f64>, comments: Option<u64>) -> RawContentItem {
        RawContentItem {
            id: "x".into(),
            source_kind: SourceKind::Rss,
            source_name: "feed".into(),
            title: "t".into(),
            body: "b".into(),
            url: None,
            author: None,
            published_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            fetched_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            score,
            comment_count: comments,
            share_count: None,
            source_priority: 10,
            source_credibility: 1.0,
            content_hash: 0,
            embedding: None,
            categories: vec![],
        }
    }

    #[test]
    fn raw_engagement_weighs_comments_double() {
        let item = sample(Some(10.0), Some(5));
        assert_eq!(item.raw_engagement(), 20.0);
    }

    #[test]
    fn raw_engagement_defaults_missing_fields_to_zero() {
        let item = sample(None, None);
        assert_eq!(item.raw_engagement(), 0.0);
    }

    #[test]
    fn weighted_rank_scales_by_priority_and_credibility() {
        let mut item = sample(Some(10.0), Some(0));
        item.source_priority = 5;
        item.source_credibility = 0.5;
        assert_eq!(item.weighted_rank(), 10.0 * 0.5 * 0.5);
    }
}
