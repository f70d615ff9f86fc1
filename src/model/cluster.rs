use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::RawContentItem;

/// A group of semantically related items produced by the clusterer and
/// consumed by the researcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCluster {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub category: String,
    pub members: Vec<RawContentItem>,
    pub centroid: Vec<f32>,
    pub coherence: f64,
    pub total_engagement: f64,
    pub source_diversity: usize,
    pub earliest_published: DateTime<Utc>,
    pub latest_published: DateTime<Utc>,
    pub is_breaking: bool,
    pub is_trending: bool,
    pub priority_score: f64,
}

impl TopicCluster {
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
