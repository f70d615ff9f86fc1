use serde::{Deserialize, Serialize};

const READING_WORDS_PER_MINUTE: usize = 200;

/// One topic's written treatment, paired one-to-one with a `ScriptSegment`
/// from the same episode's script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterSection {
    pub topic_id: String,
    pub headline: String,
    /// Markdown body.
    pub body: String,
    pub sources: Vec<String>,
    pub word_count: usize,
}

/// The written companion to a `PodcastScript`, covering the same researched
/// topics in prose rather than dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newsletter {
    pub episode_id: String,
    pub profile_id: uuid::Uuid,
    pub issue_date: chrono::NaiveDate,
    pub title: String,
    pub subtitle: String,
    pub intro: String,
    pub sections: Vec<NewsletterSection>,
    pub outro: String,
    pub total_word_count: usize,
    pub reading_time_minutes: usize,
}

impl Newsletter {
    /// Recomputes `total_word_count`/`reading_time_minutes` and each
    /// section's `word_count` from the current body text.
    pub fn calculate_stats(&mut self) {
        let mut words = self.intro.split_whitespace().count() + self.outro.split_whitespace().count();
        for section in &mut self.sections {
            section.word_count = section.body.split_whitespace().count();
            words += section.word_count;
        }
        self.total_word_count = words;
        self.reading_time_minutes = (words / READING_WORDS_PER_MINUTE).max(1);
    }

    /// Renders the full issue as a single markdown document, the form
    /// written to disk.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!("# {}", self.title), format!("*{}*", self.subtitle), String::new(), self.intro.clone(), String::new()];

        for section in &self.sections {
            lines.push(format!("## {}", section.headline));
            lines.push(String::new());
            lines.push(section.body.clone());
            if !section.sources.is_empty() {
                lines.push(String::new());
                lines.push(format!("*Sources: {}*", section.sources.join(", ")));
            }
            lines.push(String::new());
            lines.push("---".to_string());
            lines.push(String::new());
        }

        lines.push(self.outro.clone());
        lines.push(String::new());
        lines.push(format!("*{} min read · {} words*", self.reading_time_minutes, self.total_word_count));
        lines.join("\n")
    }
}
