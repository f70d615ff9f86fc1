use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Quick,
    Standard,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Pro,
    Con,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedFact {
    pub claim: String,
    pub source_url: String,
    pub source_name: String,
    pub confidence: f64,
    pub corroborating_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertOpinion {
    pub quote: String,
    pub person: String,
    pub role: String,
    pub stance: Stance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterArgument {
    pub text: String,
    pub source_url: String,
    pub credibility: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchQuality {
    pub fact_density: f64,
    pub source_diversity: usize,
    pub balance: f64,
}

/// The enriched form of a `TopicCluster`, produced by `pipeline::research`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchedTopic {
    pub cluster_id: String,
    pub headline: String,
    pub summary: String,
    pub background: String,
    pub current_situation: String,
    pub implications: String,
    pub facts: Vec<VerifiedFact>,
    pub opinions: Vec<ExpertOpinion>,
    pub counter_arguments: Vec<CounterArgument>,
    pub community_sentiment: String,
    pub depth: ResearchDepth,
    pub sources_consulted: usize,
    pub quality: ResearchQuality,
}
