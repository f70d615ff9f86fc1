use std::collections::HashSet;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::LlmClient;
use crate::clients::llm::CompletionRequest;
use crate::model::{
    CounterArgument, ExpertOpinion, ResearchDepth, ResearchQuality, ResearchedTopic, Stance, TopicCluster,
    VerifiedFact,
};

const BREAKING_DEPTH: ResearchDepth = ResearchDepth::Quick;
const HIGH_PRIORITY_DEPTH_FLOOR: f64 = 8.0;

const PREAMBLE_PREFIXES: &[&str] = &[
    "okay, i will",
    "okay i will",
    "sure, i can",
    "sure i can",
    "here's a comprehensive",
    "here is a comprehensive",
    "certainly,",
    "certainly!",
    "as an ai",
];

const OPINION_MARKERS: &[&str] = &["according to", "said", "stated", "told reporters", "noted that"];

/// Picks the research depth to apply to one cluster.
#[must_use]
pub fn depth_for(cluster: &TopicCluster) -> ResearchDepth {
    if cluster.is_breaking {
        BREAKING_DEPTH
    } else if cluster.priority_score >= HIGH_PRIORITY_DEPTH_FLOOR {
        ResearchDepth::Deep
    } else {
        // source diversity >= 3 and the catch-all both resolve to standard.
        ResearchDepth::Standard
    }
}

/// Enriches one topic cluster into a `ResearchedTopic`.
#[async_trait]
pub trait ResearchStage: Send + Sync {
    /// # Errors
    /// Returns an error when the main research pass cannot produce any
    /// usable text (all LLM calls fail).
    async fn research(
        &self,
        cluster: &TopicCluster,
        depth: ResearchDepth,
        include_counter_arguments: bool,
    ) -> anyhow::Result<ResearchedTopic>;
}

pub struct LlmResearcher {
    llm: std::sync::Arc<dyn LlmClient>,
}

impl LlmResearcher {
    #[must_use]
    pub fn new(llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    async fn quick_pass(&self, cluster: &TopicCluster) -> anyhow::Result<String> {
        let titles: Vec<&str> = cluster.members.iter().take(5).map(|m| m.title.as_str()).collect();
        let snippets: Vec<String> =
            cluster.members.iter().take(2).map(|m| m.body.chars().take(280).collect()).collect();
        let prompt = format!(
            "Topic: {}\nRecent headlines:\n{}\nContext snippets:\n{}\n\nWrite sections titled Background, Current, and Implications.",
            cluster.name,
            titles.join("\n"),
            snippets.join("\n---\n")
        );
        self.llm.complete(CompletionRequest { system_prompt: None, prompt, web_grounded: true }).await
    }

    async fn standard_followup(&self, cluster: &TopicCluster) -> anyhow::Result<String> {
        let prompt = format!(
            "Regarding \"{}\", describe the most significant recent developments, source credibility, and conflicting viewpoints.",
            cluster.name
        );
        self.llm.complete(CompletionRequest { system_prompt: None, prompt, web_grounded: true }).await
    }

    async fn deep_pass(&self, cluster: &TopicCluster) -> anyhow::Result<String> {
        let titles: Vec<&str> = cluster.members.iter().map(|m| m.title.as_str()).collect();
        let prompt = format!(
            "Topic: {}\nHeadlines: {}\n\nWrite 4-6 paragraphs covering background, current situation, and implications, with wide grounding.",
            cluster.name,
            titles.join("; ")
        );
        self.llm.complete(CompletionRequest { system_prompt: None, prompt, web_grounded: true }).await
    }

    async fn counter_arguments(&self, cluster: &TopicCluster) -> Vec<CounterArgument> {
        let queries = [
            format!("criticism of {}", cluster.name),
            format!("problems with {}", cluster.name),
            format!("alternative to {}", cluster.name),
        ];
        let mut seen_urls = HashSet::new();
        let mut out = Vec::new();
        for query in queries {
            if out.len() >= 5 {
                break;
            }
            let request = CompletionRequest { system_prompt: None, prompt: query, web_grounded: true };
            let Ok(response) = self.llm.complete(request).await else { continue };
            for line in response.lines() {
                if out.len() >= 5 {
                    break;
                }
                let Some(url) = find_url(line) else { continue };
                if !seen_urls.insert(url.to_string()) {
                    continue;
                }
                out.push(CounterArgument {
                    text: line.trim().to_string(),
                    credibility: estimate_credibility(url),
                    source_url: url.to_string(),
                });
            }
        }
        out
    }
}

#[async_trait]
impl ResearchStage for LlmResearcher {
    async fn research(
        &self,
        cluster: &TopicCluster,
        depth: ResearchDepth,
        include_counter_arguments: bool,
    ) -> anyhow::Result<ResearchedTopic> {
        let raw = match depth {
            ResearchDepth::Quick => self.quick_pass(cluster).await?,
            ResearchDepth::Standard => {
                let quick = self.quick_pass(cluster).await?;
                match self.standard_followup(cluster).await {
                    Ok(followup) => merge_near_duplicate_lines(&quick, &followup),
                    Err(error) => {
                        warn!(cluster = %cluster.id, error = %error, "standard follow-up pass failed, using quick pass only");
                        quick
                    }
                }
            }
            ResearchDepth::Deep => self.deep_pass(cluster).await?,
        };
        let scrubbed = scrub_preamble(&raw);
        let sections = parse_sections(&scrubbed);
        let (facts, opinions) = parse_facts_and_opinions(&scrubbed);

        let counter_arguments =
            if include_counter_arguments { self.counter_arguments(cluster).await } else { Vec::new() };

        let quality = compute_quality(&sections, &facts, &opinions);

        Ok(ResearchedTopic {
            cluster_id: cluster.id.clone(),
            headline: cluster.name.clone(),
            summary: cluster.summary.clone(),
            background: sections.get("background").cloned().unwrap_or_default(),
            current_situation: sections.get("current").cloned().unwrap_or_default(),
            implications: sections.get("implications").cloned().unwrap_or_default(),
            sources_consulted: facts.len() + opinions.len(),
            facts,
            opinions,
            counter_arguments,
            community_sentiment: String::new(),
            depth,
            quality,
        })
    }
}

/// Strips known model preambles and a leading markdown header line.
#[must_use]
pub fn scrub_preamble(text: &str) -> String {
    let mut remaining = text.trim_start();
    loop {
        let lowered = remaining.to_lowercase();
        let Some(prefix) = PREAMBLE_PREFIXES.iter().find(|p| lowered.starts_with(**p)) else { break };
        remaining = remaining[prefix.len()..].trim_start();
        if let Some(newline) = remaining.find('\n') {
            remaining = remaining[newline + 1..].trim_start();
        }
    }
    while remaining.starts_with('#') {
        match remaining.find('\n') {
            Some(newline) => remaining = remaining[newline + 1..].trim_start(),
            None => break,
        }
    }
    remaining.to_string()
}

fn parse_sections(text: &str) -> std::collections::HashMap<String, String> {
    let headers = [("background", "background"), ("current", "current"), ("implications", "implications")];
    let mut sections = std::collections::HashMap::new();
    let mut active: Option<&str> = None;
    let mut buffer = String::new();

    for line in text.lines() {
        let lowered = line.to_lowercase();
        let lowered_trimmed = lowered.trim_start_matches(['#', ' ', '*']).trim_end_matches([':', '*']);
        if let Some((_, key)) = headers.iter().find(|(keyword, _)| lowered_trimmed == *keyword) {
            if let Some(prior) = active {
                sections.insert(prior.to_string(), buffer.trim().to_string());
            }
            active = Some(key);
            buffer.clear();
            continue;
        }
        buffer.push_str(line);
        buffer.push('\n');
    }
    if let Some(prior) = active {
        sections.insert(prior.to_string(), buffer.trim().to_string());
    }
    sections
}

fn parse_facts_and_opinions(text: &str) -> (Vec<VerifiedFact>, Vec<ExpertOpinion>) {
    let mut facts = Vec::new();
    let mut opinions = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(url) = find_url(trimmed) {
            facts.push(VerifiedFact {
                claim: trimmed.to_string(),
                source_url: url.to_string(),
                source_name: domain_of(url),
                confidence: estimate_credibility(url),
                corroborating_urls: Vec::new(),
            });
            continue;
        }
        let lowered = trimmed.to_lowercase();
        if let Some(marker) = OPINION_MARKERS.iter().find(|m| lowered.contains(**m)) {
            let (person, role) = extract_attribution(trimmed, marker);
            opinions.push(ExpertOpinion { quote: trimmed.to_string(), person, role, stance: Stance::Neutral });
        }
    }
    (facts, opinions)
}

fn extract_attribution(line: &str, marker: &str) -> (String, String) {
    let lowered = line.to_lowercase();
    if let Some(index) = lowered.find(marker) {
        let after = line[index + marker.len()..].trim();
        let person = after.split(|c: char| c == ',' || c == '.').next().unwrap_or("").trim().to_string();
        return (person, "expert".to_string());
    }
    (String::new(), "expert".to_string())
}

fn find_url(line: &str) -> Option<&str> {
    let start = line.find("http://").or_else(|| line.find("https://"))?;
    let rest = &line[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn domain_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .trim_start_matches("www.")
        .to_string()
}

const REPUTABLE_DOMAINS: &[&str] = &["reuters.com", "apnews.com", "bbc.com", "npr.org"];
const TECH_PRESS_DOMAINS: &[&str] = &["techcrunch.com", "theverge.com", "arstechnica.com", "wired.com"];

/// Estimates source credibility from the domain: reputable newswires and
/// `.edu`/`.gov` score 0.9-0.95, tech press 0.75, else 0.6.
#[must_use]
pub fn estimate_credibility(url: &str) -> f64 {
    let domain = domain_of(url);
    if domain.ends_with(".edu") || domain.ends_with(".gov") {
        0.95
    } else if REPUTABLE_DOMAINS.iter().any(|d| domain.ends_with(d)) {
        0.9
    } else if TECH_PRESS_DOMAINS.iter().any(|d| domain.ends_with(d)) {
        0.75
    } else {
        0.6
    }
}

fn merge_near_duplicate_lines(base: &str, addition: &str) -> String {
    let mut seen: HashSet<String> = base.lines().map(|l| normalize_for_dedup(l)).collect();
    let mut merged = base.to_string();
    for line in addition.lines() {
        let key = normalize_for_dedup(line);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        merged.push('\n');
        merged.push_str(line);
    }
    merged
}

fn normalize_for_dedup(line: &str) -> String {
    line.trim().to_lowercase()
}

fn compute_quality(
    sections: &std::collections::HashMap<String, String>,
    facts: &[VerifiedFact],
    opinions: &[ExpertOpinion],
) -> ResearchQuality {
    let word_count: usize = sections.values().map(|s| s.split_whitespace().count()).sum();
    let fact_density = if word_count == 0 { 0.0 } else { 100.0 * facts.len() as f64 / word_count as f64 };
    let source_diversity = facts.iter().map(|f| f.source_name.clone()).collect::<HashSet<_>>().len();

    let (pro, con) = opinions.iter().fold((0usize, 0usize), |(pro, con), opinion| match opinion.stance {
        Stance::Pro => (pro + 1, con),
        Stance::Con => (pro, con + 1),
        Stance::Neutral => (pro, con),
    });
    let balance = if pro + con == 0 { 0.5 } else { pro.min(con) as f64 / (pro + con) as f64 };

    ResearchQuality { fact_density, source_diversity, balance }
}
