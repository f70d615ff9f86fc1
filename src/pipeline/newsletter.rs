use async_trait::async_trait;

use crate::clients::LlmClient;
use crate::clients::llm::CompletionRequest;
use crate::model::{Newsletter, NewsletterSection, PodcastScript, Profile};

const SECTION_TARGET_WORDS: u32 = 150;

/// Writes a prose companion to a rendered script, covering the same
/// segments in a newsletter format instead of dialogue.
#[async_trait]
pub trait NewsletterStage: Send + Sync {
    /// # Errors
    /// Returns an error only when the main LLM call itself cannot be
    /// reached; malformed or missing sections fall back to the script's own
    /// dialogue text instead of erroring.
    async fn generate(&self, profile: &Profile, script: &PodcastScript) -> anyhow::Result<Newsletter>;
}

pub struct LlmNewsletterGenerator {
    llm: std::sync::Arc<dyn LlmClient>,
}

impl LlmNewsletterGenerator {
    #[must_use]
    pub fn new(llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl NewsletterStage for LlmNewsletterGenerator {
    async fn generate(&self, profile: &Profile, script: &PodcastScript) -> anyhow::Result<Newsletter> {
        let intro = self.generate_intro(profile, script).await;
        let mut sections = Vec::with_capacity(script.segments.len());
        for segment in &script.segments {
            sections.push(self.generate_section(segment).await);
        }
        let outro = self.generate_outro(profile, script).await;

        let mut newsletter = Newsletter {
            episode_id: script.episode_id.clone(),
            profile_id: profile.id,
            issue_date: script.episode_date,
            title: format!("{}: {}", profile.display_name, script.title),
            subtitle: script.segments.first().map_or_else(|| "This week's update".to_string(), |s| s.topic_title.clone()),
            intro,
            sections,
            outro,
        };
        newsletter.calculate_stats();
        Ok(newsletter)
    }
}

impl LlmNewsletterGenerator {
    async fn generate_intro(&self, profile: &Profile, script: &PodcastScript) -> String {
        let topics_preview: Vec<String> = script.segments.iter().take(4).map(|s| format!("- {}", s.topic_title)).collect();
        let prompt = format!(
            "Write a newsletter intro (2-3 short paragraphs, ~60-80 words) for {}'s written companion to today's episode, titled \"{}\". Tease these topics without giving everything away:\n{}\n\nWrite in markdown, no header.",
            profile.display_name,
            script.title,
            topics_preview.join("\n"),
        );
        self.generate(prompt).await.unwrap_or_else(|| dialogue_text(&script.intro))
    }

    async fn generate_outro(&self, profile: &Profile, script: &PodcastScript) -> String {
        let topics_summary: Vec<String> = script.segments.iter().take(3).map(|s| s.topic_title.clone()).collect();
        let prompt = format!(
            "Write a brief newsletter outro (~40-60 words) for {}. Recap the key insight and close with a simple call to action. Topics covered: {}.\n\nWrite in markdown, keep it short.",
            profile.display_name,
            topics_summary.join(", "),
        );
        self.generate(prompt).await.unwrap_or_else(|| dialogue_text(&script.outro))
    }

    async fn generate_section(&self, segment: &crate::model::ScriptSegment) -> NewsletterSection {
        let prompt = format!(
            "Write a newsletter section (markdown, ~{SECTION_TARGET_WORDS} words) about this topic. Start with a hook, use short paragraphs and bullet points for key information, end with a clear takeaway. No section header, start directly with the content.\n\nTopic: {}\nSource material:\n{}",
            segment.topic_title,
            dialogue_text(&segment.dialogue),
        );
        let body = self.generate(prompt).await.unwrap_or_else(|| dialogue_text(&segment.dialogue));
        NewsletterSection {
            topic_id: segment.topic_id.clone(),
            headline: segment.topic_title.clone(),
            body,
            sources: Vec::new(),
            word_count: 0,
        }
    }

    async fn generate(&self, prompt: String) -> Option<String> {
        let request = CompletionRequest { system_prompt: None, prompt, web_grounded: false };
        self.llm.complete(request).await.ok().map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
    }
}

fn dialogue_text(lines: &[crate::model::DialogueLine]) -> String {
    lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(" ")
}

/// Canonical on-disk slug: `{outputRoot}/newsletters/{episodeId}.md`.
#[must_use]
pub fn file_name(episode_id: &str) -> String {
    format!("{episode_id}.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DialogueLine, ScriptSegment};
    use std::sync::Arc;

    struct FakeLlm {
        response: Option<String>,
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn complete(&self, _request: CompletionRequest) -> anyhow::Result<String> {
            match &self.response {
                Some(text) => Ok(text.clone()),
                None => anyhow::bail!("synthetic failure"),
            }
        }
    }

    fn profile() -> Profile {
        Profile {
            id: uuid::Uuid::new_v4(),
            display_name: "Daily Signal".to_string(),
            tone: "conversational".to_string(),
            target_audience: "tech workers".to_string(),
            target_duration_minutes: 20,
            topic_count: 1,
            hosts: vec![],
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

    fn script() -> PodcastScript {
        PodcastScript {
            episode_id: "daily-signal-20260101".to_string(),
            title: "Chips shortage eases".to_string(),
            episode_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            duration_estimate_seconds: 0,
            intro: vec![DialogueLine { speaker: "alex".to_string(), text: "welcome back".to_string(), emotion: None }],
            segments: vec![ScriptSegment {
                topic_id: "c1".to_string(),
                topic_title: "Chips shortage eases".to_string(),
                duration_estimate_seconds: 0,
                dialogue: vec![DialogueLine { speaker: "alex".to_string(), text: "supply chains are recovering".to_string(), emotion: None }],
            }],
            outro: vec![DialogueLine { speaker: "alex".to_string(), text: "thanks for listening".to_string(), emotion: None }],
        }
    }

    #[tokio::test]
    async fn generate_uses_llm_output_for_each_part() {
        let generator = LlmNewsletterGenerator::new(Arc::new(FakeLlm { response: Some("Written content here.".to_string()) }));
        let newsletter = generator.generate(&profile(), &script()).await.unwrap();
        assert_eq!(newsletter.sections.len(), 1);
        assert_eq!(newsletter.intro, "Written content here.");
        assert!(newsletter.total_word_count > 0);
    }

    #[tokio::test]
    async fn generate_falls_back_to_dialogue_text_when_llm_fails() {
        let generator = LlmNewsletterGenerator::new(Arc::new(FakeLlm { response: None }));
        let newsletter = generator.generate(&profile(), &script()).await.unwrap();
        assert_eq!(newsletter.intro, "welcome back");
        assert_eq!(newsletter.sections[0].body, "supply chains are recovering");
        assert_eq!(newsletter.outro, "thanks for listening");
    }

    #[test]
    fn file_name_uses_episode_id_with_md_extension() {
        assert_eq!(file_name("daily-signal-20260101"), "daily-signal-20260101.md");
    }
}
