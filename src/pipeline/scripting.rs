use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::clients::LlmClient;
use crate::clients::llm::CompletionRequest;
use crate::model::{DialogueLine, PodcastScript, Profile, ResearchedTopic, ScriptSegment, TopicHistoryEntry, VerifiedTopic};

const WORDS_PER_MINUTE: f64 = 150.0;
const TARGET_EXCHANGES_PER_SEGMENT: (usize, usize) = (8, 12);
const CONTINUITY_EPISODE_COUNT: usize = 3;

/// One enriched topic, paired with the research it was verified from, ready
/// to be formatted into a script section.
pub struct TopicForScript<'a> {
    pub verified: &'a VerifiedTopic,
    pub researched: &'a ResearchedTopic,
}

/// Turns verified, researched topics into a multi-speaker script.
#[async_trait]
pub trait ScriptingStage: Send + Sync {
    /// `auto_editorial_pass` gates the automated LLM quality-review pass
    /// applied to the synthesized script; it is independent of the
    /// orchestrator's human-approval `editorial_review` pause.
    ///
    /// # Errors
    /// Returns an error only when the main LLM call itself cannot be
    /// reached; a malformed response degrades to the deterministic fallback
    /// instead of erroring.
    async fn synthesize(
        &self,
        profile: &Profile,
        topics: &[TopicForScript<'_>],
        previous_episodes: &[TopicHistoryEntry],
        target_date: NaiveDate,
        auto_editorial_pass: bool,
    ) -> anyhow::Result<PodcastScript>;
}

pub struct LlmScriptSynthesizer {
    llm: std::sync::Arc<dyn LlmClient>,
}

impl LlmScriptSynthesizer {
    #[must_use]
    pub fn new(llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Deserialize)]
struct RawDialogueLine {
    speaker: String,
    text: String,
    #[serde(default)]
    emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    topic_id: Option<String>,
    #[serde(default)]
    topic_title: Option<String>,
    #[serde(default)]
    dialogue: Vec<RawDialogueLine>,
    // alternate schema: flat segments tagged by segmentTitle/script instead
    // of topic_id/dialogue.
    #[serde(default)]
    segment_title: Option<String>,
    #[serde(default)]
    script: Vec<RawDialogueLine>,
}

#[derive(Debug, Deserialize)]
struct RawScript {
    #[serde(default)]
    intro: Vec<RawDialogueLine>,
    #[serde(default)]
    segments: Vec<RawSegment>,
    #[serde(default)]
    outro: Vec<RawDialogueLine>,
}

#[async_trait]
impl ScriptingStage for LlmScriptSynthesizer {
    async fn synthesize(
        &self,
        profile: &Profile,
        topics: &[TopicForScript<'_>],
        previous_episodes: &[TopicHistoryEntry],
        target_date: NaiveDate,
        auto_editorial_pass: bool,
    ) -> anyhow::Result<PodcastScript> {
        let system_prompt = build_system_prompt(profile, previous_episodes);
        let prompt = build_topics_prompt(topics);

        let response =
            self.llm.complete(CompletionRequest { system_prompt: Some(system_prompt), prompt, web_grounded: false }).await?;

        let mut script = match parse_script_response(&response, topics, target_date, profile) {
            Some(script) => script,
            None => {
                warn!("script response could not be parsed, using deterministic fallback");
                deterministic_fallback(topics, target_date, profile)
            }
        };

        if auto_editorial_pass {
            script = apply_editorial_pass(&self.llm, script, topics, target_date, profile).await;
        }

        script.duration_estimate_seconds = estimate_duration_seconds(&script);
        Ok(script)
    }
}

fn build_system_prompt(profile: &Profile, previous_episodes: &[TopicHistoryEntry]) -> String {
    let hosts: Vec<String> = profile
        .hosts
        .iter()
        .map(|h| format!("{} ({}), speaking style: {}, expertise: {}", h.name, h.persona, h.speaking_style, h.expertise_tags.join(", ")))
        .collect();

    let continuity: Vec<String> = previous_episodes
        .iter()
        .take(CONTINUITY_EPISODE_COUNT)
        .map(|entry| format!("{} ({}): {}", entry.title, entry.category, entry.summary))
        .collect();

    format!(
        "Podcast: {}\nHosts:\n{}\nContinuity (recent episodes):\n{}\nStyle: conversational, cite specific facts, include emotional beats, no forced slang.\nTarget {} exchanges per segment.",
        profile.display_name,
        hosts.join("\n"),
        if continuity.is_empty() { "none".to_string() } else { continuity.join("\n") },
        format!("{}-{}", TARGET_EXCHANGES_PER_SEGMENT.0, TARGET_EXCHANGES_PER_SEGMENT.1)
    )
}

fn build_topics_prompt(topics: &[TopicForScript<'_>]) -> String {
    let sections: Vec<String> = topics.iter().map(|topic| format_topic_section(topic)).collect();
    format!(
        "{}\n\nRespond with JSON containing exactly three keys: intro, segments, outro. intro and outro are lists of {{\"speaker\", \"text\"}}. segments is a list of {{\"topic_id\", \"topic_title\", \"dialogue\": [...]}}.",
        sections.join("\n\n---\n\n")
    )
}

fn format_topic_section(topic: &TopicForScript<'_>) -> String {
    let facts: Vec<String> =
        topic.researched.facts.iter().map(|f| format!("- {} (source: {})", f.claim, f.source_name)).collect();
    let opinions: Vec<String> = topic
        .researched
        .opinions
        .iter()
        .map(|o| format!("- {}: \"{}\" ({})", o.person, o.quote, o.role))
        .collect();
    let debate: Vec<String> =
        topic.researched.counter_arguments.iter().map(|c| format!("- {}", c.text)).collect();

    format!(
        "Topic {}: {}\nKey facts:\n{}\nHistorical/current/future:\n{}\n{}\n{}\nExpert opinions:\n{}\nCommunity reactions: {}\nDebate points:\n{}\nSuggested tone: {:?}\nTalking points: {}",
        topic.researched.cluster_id,
        topic.verified.final_headline,
        facts.join("\n"),
        topic.researched.background,
        topic.researched.current_situation,
        topic.researched.implications,
        opinions.join("\n"),
        topic.researched.community_sentiment,
        debate.join("\n"),
        topic.verified.suggested_tone,
        topic.verified.key_talking_points.join(", ")
    )
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

fn largest_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start { None } else { Some(&text[start..=end]) }
}

fn parse_script_response(
    response: &str,
    topics: &[TopicForScript<'_>],
    target_date: NaiveDate,
    profile: &Profile,
) -> Option<PodcastScript> {
    let stripped = strip_code_fences(response);
    let raw: RawScript = serde_json::from_str(stripped)
        .ok()
        .or_else(|| serde_json::from_str(largest_json_object(stripped)?).ok())?;
    Some(normalize_raw_script(raw, topics, target_date, profile))
}

fn normalize_raw_script(
    raw: RawScript,
    topics: &[TopicForScript<'_>],
    target_date: NaiveDate,
    profile: &Profile,
) -> PodcastScript {
    let mut intro: Vec<DialogueLine> = raw.intro.into_iter().map(normalize_line).collect();
    let mut outro: Vec<DialogueLine> = raw.outro.into_iter().map(normalize_line).collect();
    let mut segments = Vec::new();

    for segment in raw.segments {
        let is_canonical = segment.topic_id.is_some() && !segment.dialogue.is_empty();
        if is_canonical {
            segments.push(ScriptSegment {
                topic_id: segment.topic_id.unwrap_or_default(),
                topic_title: segment.topic_title.unwrap_or_default(),
                duration_estimate_seconds: 0,
                dialogue: segment.dialogue.into_iter().map(normalize_line).collect(),
            });
            continue;
        }

        // alternate schema: segmentTitle/script, possibly an intro/outro in
        // disguise.
        let title = segment.segment_title.clone().unwrap_or_default();
        let lowered = title.to_lowercase();
        let dialogue: Vec<DialogueLine> = segment.script.into_iter().map(normalize_line).collect();
        if lowered.contains("intro") {
            intro.extend(dialogue);
        } else if lowered.contains("outro") {
            outro.extend(dialogue);
        } else {
            segments.push(ScriptSegment { topic_id: String::new(), topic_title: title, duration_estimate_seconds: 0, dialogue });
        }
    }

    if segments.is_empty() && !topics.is_empty() {
        return deterministic_fallback(topics, target_date, profile);
    }

    PodcastScript {
        episode_id: episode_id(profile, target_date),
        title: episode_title(profile, topics, target_date),
        episode_date: target_date,
        duration_estimate_seconds: 0,
        intro,
        segments,
        outro,
    }
}

fn normalize_line(line: RawDialogueLine) -> DialogueLine {
    DialogueLine { speaker: line.speaker.to_lowercase(), text: line.text, emotion: line.emotion }
}

fn deterministic_fallback(topics: &[TopicForScript<'_>], target_date: NaiveDate, profile: &Profile) -> PodcastScript {
    let host = profile.hosts.first().map(|h| h.name.to_lowercase()).unwrap_or_else(|| "host".to_string());
    let intro = vec![DialogueLine {
        speaker: host.clone(),
        text: format!("Welcome back to {}. Here's what we're covering today.", profile.display_name),
        emotion: None,
    }];
    let segments = topics
        .iter()
        .map(|topic| ScriptSegment {
            topic_id: topic.researched.cluster_id.clone(),
            topic_title: topic.verified.final_headline.clone(),
            duration_estimate_seconds: 0,
            dialogue: vec![DialogueLine {
                speaker: host.clone(),
                text: topic.verified.final_summary.clone(),
                emotion: None,
            }],
        })
        .collect();
    let outro = vec![DialogueLine { speaker: host, text: "That's all for today, thanks for listening.".to_string(), emotion: None }];

    PodcastScript {
        episode_id: episode_id(profile, target_date),
        title: episode_title(profile, topics, target_date),
        episode_date: target_date,
        duration_estimate_seconds: 0,
        intro,
        segments,
        outro,
    }
}

async fn apply_editorial_pass(
    llm: &std::sync::Arc<dyn LlmClient>,
    script: PodcastScript,
    topics: &[TopicForScript<'_>],
    target_date: NaiveDate,
    profile: &Profile,
) -> PodcastScript {
    let Ok(serialized) = serde_json::to_string(&ScriptJson::from(&script)) else { return script };
    let prompt = format!(
        "Review this podcast script JSON and return an improved version with the same three-key schema. Ensure related topics are grouped, no duplicate facts across segments, explicit transitions between segment groups, emotional beats are present, and no forced slang.\n\n{serialized}"
    );
    let request = CompletionRequest { system_prompt: None, prompt, web_grounded: false };
    let Ok(response) = llm.complete(request).await else { return script };
    parse_script_response(&response, topics, target_date, profile).unwrap_or(script)
}

#[derive(serde::Serialize)]
struct ScriptJson {
    intro: Vec<DialogueLineJson>,
    segments: Vec<SegmentJson>,
    outro: Vec<DialogueLineJson>,
}

#[derive(serde::Serialize)]
struct DialogueLineJson {
    speaker: String,
    text: String,
}

#[derive(serde::Serialize)]
struct SegmentJson {
    topic_id: String,
    topic_title: String,
    dialogue: Vec<DialogueLineJson>,
}

impl From<&PodcastScript> for ScriptJson {
    fn from(script: &PodcastScript) -> Self {
        let convert = |lines: &[DialogueLine]| -> Vec<DialogueLineJson> {
            lines.iter().map(|l| DialogueLineJson { speaker: l.speaker.clone(), text: l.text.clone() }).collect()
        };
        ScriptJson {
            intro: convert(&script.intro),
            segments: script
                .segments
                .iter()
                .map(|s| SegmentJson { topic_id: s.topic_id.clone(), topic_title: s.topic_title.clone(), dialogue: convert(&s.dialogue) })
                .collect(),
            outro: convert(&script.outro),
        }
    }
}

fn estimate_duration_seconds(script: &PodcastScript) -> u32 {
    let words = script.total_word_count();
    ((words as f64 / WORDS_PER_MINUTE) * 60.0).round() as u32
}

fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

fn episode_id(profile: &Profile, target_date: NaiveDate) -> String {
    format!("{}-{}", slugify(&profile.display_name), target_date.format("%Y%m%d"))
}

fn episode_title(profile: &Profile, topics: &[TopicForScript<'_>], target_date: NaiveDate) -> String {
    let top_title = topics.first().map(|t| t.verified.final_headline.as_str()).unwrap_or("Daily Roundup");
    format!("{top_title} — {} — {}", profile.display_name, target_date.format("%B %-d, %Y"))
}

#[allow(dead_code)]
fn distinct_speakers(script: &PodcastScript) -> HashSet<String> {
    script
        .intro
        .iter()
        .chain(script.segments.iter().flat_map(|s| s.dialogue.iter()))
        .chain(script.outro.iter())
        .map(|l| l.speaker.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResearchDepth, ResearchQuality, SuggestedTone};

    fn profile() -> Profile {
        Profile {
            id: uuid::Uuid::new_v4(),
            display_name: "Daily Signal".to_string(),
            tone: "conversational".to_string(),
            target_audience: "tech workers".to_string(),
            target_duration_minutes: 20,
            topic_count: 3,
            hosts: vec![crate::model::Host {
                name: "Alex".to_string(),
                persona: "curious generalist".to_string(),
                voice_id: "voice-1".to_string(),
                speaking_style: "warm".to_string(),
                expertise_tags: vec!["tech".to_string()],
            }],
            sources: vec![],
            avoidance_rules: vec![],
            schedule: crate::model::Schedule {
                enabled: true,
                hour: 7,
                minute: 0,
                weekdays: vec![1, 2, 3, 4, 5],
                timezone: "UTC".to_string(),
                last_run: None,
            },
        }
    }

    fn topic() -> (VerifiedTopic, ResearchedTopic) {
        (
            VerifiedTopic {
                cluster_id: "c1".to_string(),
                final_headline: "Chips shortage eases".to_string(),
                final_summary: "Supply chains are recovering.".to_string(),
                suggested_tone: SuggestedTone::Informative,
                suggested_duration_seconds: 180,
                key_talking_points: vec!["supply".to_string()],
                priority_rank: 1,
                editorial_score: 8.0,
                approved: true,
            },
            ResearchedTopic {
                cluster_id: "c1".to_string(),
                headline: "Chips shortage eases".to_string(),
                summary: "Supply chains are recovering.".to_string(),
                background: "Shortage began in 2021.".to_string(),
                current_situation: "Inventories are normalizing.".to_string(),
                implications: "Prices may fall.".to_string(),
                facts: vec![],
                opinions: vec![],
                counter_arguments: vec![],
                community_sentiment: "cautiously optimistic".to_string(),
                depth: ResearchDepth::Standard,
                sources_consulted: 0,
                quality: ResearchQuality::default(),
            },
        )
    }

    #[test]
    fn slugify_normalizes_punctuation_and_case() {
        assert_eq!(slugify("Daily Signal!"), "daily-signal");
    }

    #[test]
    fn episode_id_combines_slug_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        assert_eq!(episode_id(&profile(), date), "daily-signal-20260728");
    }

    #[test]
    fn parse_script_response_handles_code_fenced_json() {
        let (verified, researched) = topic();
        let topics = vec![TopicForScript { verified: &verified, researched: &researched }];
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let response = "```json\n{\"intro\":[{\"speaker\":\"Alex\",\"text\":\"hi\"}],\"segments\":[{\"topic_id\":\"c1\",\"topic_title\":\"Chips\",\"dialogue\":[{\"speaker\":\"Alex\",\"text\":\"details\"}]}],\"outro\":[{\"speaker\":\"Alex\",\"text\":\"bye\"}]}\n```";
        let script = parse_script_response(response, &topics, date, &profile()).unwrap();
        assert_eq!(script.intro[0].speaker, "alex");
        assert_eq!(script.segments.len(), 1);
    }

    #[test]
    fn normalize_raw_script_remaps_alternate_schema_intro_and_outro() {
        let (verified, researched) = topic();
        let topics = vec![TopicForScript { verified: &verified, researched: &researched }];
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let raw = RawScript {
            intro: vec![],
            outro: vec![],
            segments: vec![
                RawSegment {
                    topic_id: None,
                    topic_title: None,
                    dialogue: vec![],
                    segment_title: Some("Intro Banter".to_string()),
                    script: vec![RawDialogueLine { speaker: "Alex".to_string(), text: "hey".to_string(), emotion: None }],
                },
                RawSegment {
                    topic_id: Some("c1".to_string()),
                    topic_title: Some("Chips".to_string()),
                    dialogue: vec![RawDialogueLine { speaker: "Alex".to_string(), text: "details".to_string(), emotion: None }],
                    segment_title: None,
                    script: vec![],
                },
            ],
        };
        let script = normalize_raw_script(raw, &topics, date, &profile());
        assert_eq!(script.intro.len(), 1);
        assert_eq!(script.segments.len(), 1);
    }

    #[test]
    fn deterministic_fallback_uses_topic_summaries() {
        let (verified, researched) = topic();
        let topics = vec![TopicForScript { verified: &verified, researched: &researched }];
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let script = deterministic_fallback(&topics, date, &profile());
        assert_eq!(script.segments.len(), 1);
        assert_eq!(script.segments[0].dialogue[0].text, "Supply chains are recovering.");
    }

    #[test]
    fn estimate_duration_seconds_uses_words_per_minute() {
        let (verified, researched) = topic();
        let topics = vec![TopicForScript { verified: &verified, researched: &researched }];
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let script = deterministic_fallback(&topics, date, &profile());
        let words = script.total_word_count();
        let expected = ((words as f64 / WORDS_PER_MINUTE) * 60.0).round() as u32;
        assert_eq!(estimate_duration_seconds(&script), expected);
    }
}
