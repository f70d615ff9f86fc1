use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Draft,
    Published,
    Archived,
}

/// The persisted result of a successful job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub profile_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub topics_covered: Vec<String>,
    pub script_json: serde_json::Value,
    pub summary: String,
    pub key_facts: Vec<String>,
    pub stitched_audio_path: Option<String>,
    pub duration_seconds: f64,
    pub status: EpisodeStatus,
}

/// One row per topic per episode, read back by the researcher and
/// synthesizer of the *next* job for the same profile to avoid repetition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicHistoryEntry {
    pub episode_id: String,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub facts_mentioned: Vec<String>,
    pub ongoing: bool,
    pub follow_up_notes: Option<String>,
    pub importance: f64,
}
