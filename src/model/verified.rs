use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedTone {
    Urgent,
    Analytical,
    Conversational,
    Informative,
    Balanced,
}

/// A `ResearchedTopic` plus editorial metadata, produced right before
/// scripting so script synthesis has a ranked, tone-annotated input list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTopic {
    pub cluster_id: String,
    pub final_headline: String,
    pub final_summary: String,
    pub suggested_tone: SuggestedTone,
    pub suggested_duration_seconds: u32,
    pub key_talking_points: Vec<String>,
    pub priority_rank: u32,
    pub editorial_score: f64,
    pub approved: bool,
}
