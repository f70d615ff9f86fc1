use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed, totally ordered stage-name set the orchestrator ever produces;
/// no `content_gathering` alias exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    Aggregation,
    Clustering,
    Research,
    Scripting,
    Review,
    Audio,
    Persisting,
    Done,
}

impl Stage {
    pub const ORDER: [Stage; 9] = [
        Stage::Initializing,
        Stage::Aggregation,
        Stage::Clustering,
        Stage::Research,
        Stage::Scripting,
        Stage::Review,
        Stage::Audio,
        Stage::Persisting,
        Stage::Done,
    ];

    /// Progress percentage assigned at stage entry: 5, 20, 35, 50, 60, (60), 75, 95, 100.
    #[must_use]
    pub fn entry_percent(self) -> u8 {
        match self {
            Stage::Initializing => 5,
            Stage::Aggregation => 20,
            Stage::Clustering => 35,
            Stage::Research => 50,
            Stage::Scripting => 60,
            Stage::Review => 60,
            Stage::Audio => 75,
            Stage::Persisting => 95,
            Stage::Done => 100,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::Aggregation => "aggregation",
            Stage::Clustering => "clustering",
            Stage::Research => "research",
            Stage::Scripting => "scripting",
            Stage::Review => "review",
            Stage::Audio => "audio",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// The `stagesPending` list a freshly created job is seeded with:
    /// everything between aggregation and audio inclusive.
    #[must_use]
    pub fn initial_pending() -> Vec<Stage> {
        vec![
            Stage::Aggregation,
            Stage::Clustering,
            Stage::Research,
            Stage::Scripting,
            Stage::Review,
            Stage::Audio,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    WaitingForReview,
    Resumed,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
}

/// Frozen at job creation, so a restarted worker resuming a job re-derives
/// identical behavior from the row alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    pub topic_count: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub deep_research: bool,
    pub editorial_review: bool,
    /// Automated LLM quality/editorial pass applied to the synthesized
    /// script, independent of `editorial_review`'s human-approval pause.
    #[serde(default = "default_true")]
    pub auto_editorial_pass: bool,
    #[serde(default = "default_true")]
    pub use_continuity: bool,
    pub tts_model: Option<String>,
    #[serde(default = "default_true")]
    pub generate_audio: bool,
}

fn default_true() -> bool {
    true
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            topic_count: None,
            duration_minutes: None,
            deep_research: false,
            editorial_review: false,
            auto_editorial_pass: true,
            use_continuity: true,
            tts_model: None,
            generate_audio: true,
        }
    }
}

/// The durable state of one production run; the only entity the
/// orchestrator writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub target_date: chrono::NaiveDate,
    pub status: JobStatus,
    pub current_stage: Option<Stage>,
    pub progress_percent: u8,
    pub stages_completed: Vec<Stage>,
    pub stages_pending: Vec<Stage>,
    pub activity_log: VecDeque<ActivityLogEntry>,
    pub current_activity: String,
    pub options: JobOptions,
    pub episode_id: Option<String>,
    pub error_message: Option<String>,
    pub is_recoverable: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Activity log entries are bounded; the oldest is dropped once the log
/// exceeds this many entries (see `Config::job_activity_log_max_entries`).
pub const DEFAULT_ACTIVITY_LOG_MAX_ENTRIES: usize = 200;

impl GenerationJob {
    #[must_use]
    pub fn new(profile_id: Uuid, target_date: chrono::NaiveDate, options: JobOptions, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            target_date,
            status: JobStatus::Pending,
            current_stage: None,
            progress_percent: 0,
            stages_completed: Vec::new(),
            stages_pending: Stage::initial_pending(),
            activity_log: VecDeque::new(),
            current_activity: "queued".to_string(),
            options,
            episode_id: None,
            error_message: None,
            is_recoverable: false,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Appends an activity log entry, truncating the oldest one past the
    /// configured cap.
    pub fn log(&mut self, message: impl Into<String>, level: LogLevel, now: DateTime<Utc>, max_entries: usize) {
        let message = message.into();
        self.current_activity.clone_from(&message);
        self.activity_log.push_back(ActivityLogEntry {
            timestamp: now,
            message,
            level,
        });
        while self.activity_log.len() > max_entries {
            self.activity_log.pop_front();
        }
    }

    /// Invariant 1: `stagesCompleted ∩ stagesPending = ∅`.
    pub fn enter_stage(&mut self, stage: Stage) {
        self.current_stage = Some(stage);
        self.progress_percent = stage.entry_percent();
        self.stages_pending.retain(|s| *s != stage);
    }

    pub fn complete_stage(&mut self, stage: Stage) {
        if !self.stages_completed.contains(&stage) {
            self.stages_completed.push(stage);
        }
        self.stages_pending.retain(|s| *s != stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn stage_entry_percentages_match_spec() {
        assert_eq!(Stage::Initializing.entry_percent(), 5);
        assert_eq!(Stage::Aggregation.entry_percent(), 20);
        assert_eq!(Stage::Clustering.entry_percent(), 35);
        assert_eq!(Stage::Research.entry_percent(), 50);
        assert_eq!(Stage::Scripting.entry_percent(), 60);
        assert_eq!(Stage::Review.entry_percent(), 60);
        assert_eq!(Stage::Audio.entry_percent(), 75);
        assert_eq!(Stage::Persisting.entry_percent(), 95);
        assert_eq!(Stage::Done.entry_percent(), 100);
    }

    #[test]
    fn new_job_seeds_pending_stages_without_initializing_or_persisting() {
        let job = GenerationJob::new(
            Uuid::new_v4(),
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            JobOptions::default(),
            now(),
        );
        assert!(!job.stages_pending.contains(&Stage::Initializing));
        assert!(!job.stages_pending.contains(&Stage::Persisting));
        assert!(job.stages_pending.contains(&Stage::Audio));
    }

    #[test]
    fn enter_stage_and_complete_stage_keep_sets_disjoint() {
        let mut job = GenerationJob::new(
            Uuid::new_v4(),
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            JobOptions::default(),
            now(),
        );
        job.enter_stage(Stage::Aggregation);
        job.complete_stage(Stage::Aggregation);
        let overlap: Vec<_> = job
            .stages_completed
            .iter()
            .filter(|s| job.stages_pending.contains(s))
            .collect();
        assert!(overlap.is_empty());
    }

    #[test]
    fn activity_log_truncates_oldest_past_cap() {
        let mut job = GenerationJob::new(
            Uuid::new_v4(),
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            JobOptions::default(),
            now(),
        );
        for i in 0..5 {
            job.log(format!("entry {i}"), LogLevel::Info, now(), 3);
        }
        assert_eq!(job.activity_log.len(), 3);
        assert_eq!(job.activity_log.front().unwrap().message, "entry 2");
    }
}
