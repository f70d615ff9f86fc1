use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A long-lived configuration a Scheduler trigger and the HTTP API both
/// resolve against. Created and mutated by the user; never destroyed
/// automatically (a delete cascades to its jobs and episodes, see
/// `store::dao::profile`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub tone: String,
    pub target_audience: String,
    pub target_duration_minutes: u32,
    pub topic_count: u32,
    pub hosts: Vec<Host>,
    pub sources: Vec<ContentSource>,
    pub avoidance_rules: Vec<TopicAvoidanceRule>,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub persona: String,
    pub voice_id: String,
    pub speaking_style: String,
    pub expertise_tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Forum,
    NewsApi,
    Rss,
    VideoTranscripts,
    AggregatorBoard,
}

impl SourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forum => "forum",
            Self::NewsApi => "news-api",
            Self::Rss => "rss",
            Self::VideoTranscripts => "video-transcripts",
            Self::AggregatorBoard => "aggregator-board",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSource {
    pub id: Uuid,
    pub kind: SourceKind,
    pub config: serde_json::Value,
    /// 1–10, higher weighs more in `Aggregation::rank`.
    pub priority: u8,
    /// 0.0–1.0, multiplied into the engagement rank.
    pub credibility: f64,
    pub active: bool,
    /// Matched against `title + body`; an item is kept only if at least one
    /// include keyword matches (empty means no include filter).
    pub include_keywords: Vec<String>,
    /// Matched against `title + body`; any match drops the item.
    pub exclude_keywords: Vec<String>,
}

impl Default for ContentSource {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            kind: SourceKind::Rss,
            config: serde_json::Value::Null,
            priority: 5,
            credibility: 1.0,
            active: true,
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvoidanceKind {
    Temporary,
    Permanent,
    ReduceFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAvoidanceRule {
    pub keyword: String,
    pub kind: AvoidanceKind,
    pub until: Option<DateTime<Utc>>,
    pub min_days_between_mentions: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub enabled: bool,
    pub hour: u8,
    pub minute: u8,
    /// 0 = Sunday .. 6 = Saturday, matching `chrono::Weekday::num_days_from_sunday`.
    pub weekdays: Vec<u8>,
    pub timezone: String,
    pub last_run: Option<DateTime<Utc>>,
}
