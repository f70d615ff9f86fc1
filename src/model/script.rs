use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
    pub emotion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub topic_id: String,
    pub topic_title: String,
    pub duration_estimate_seconds: u32,
    pub dialogue: Vec<DialogueLine>,
}

/// The synthesized episode script: scripting's output and audio rendering's
/// input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastScript {
    pub episode_id: String,
    pub title: String,
    pub episode_date: chrono::NaiveDate,
    pub duration_estimate_seconds: u32,
    pub intro: Vec<DialogueLine>,
    pub segments: Vec<ScriptSegment>,
    pub outro: Vec<DialogueLine>,
}

impl PodcastScript {
    #[must_use]
    pub fn total_word_count(&self) -> usize {
        let count_lines = |lines: &[DialogueLine]| -> usize {
            lines.iter().map(|l| l.text.split_whitespace().count()).sum()
        };
        count_lines(&self.intro)
            + self
                .segments
                .iter()
                .map(|s| count_lines(&s.dialogue))
                .sum::<usize>()
            + count_lines(&self.outro)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_word_count_sums_all_sections() {
        let line = |text: &str| DialogueLine {
            speaker: "alex".into(),
            text: text.into(),
            emotion: None,
        };
        let script = PodcastScript {
            episode_id: "e".into(),
            title: "t".into(),
            episode_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            duration_estimate_seconds: 0,
            intro: vec![line("one two three")],
            segments: vec![ScriptSegment {
                topic_id: "c1".into(),
                topic_title: "topic".into(),
                duration_estimate_seconds: 0,
                dialogue: vec![line("four five")],
            }],
            outro: vec![line("six")],
        };
        assert_eq!(script.total_word_count(), 6);
    }
}
