use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::model::{Episode, GenerationJob, Newsletter, Profile, TopicHistoryEntry};

/// Profiles and jobs are stored as a narrow set of queryable columns plus a
/// JSONB blob holding the full domain struct, avoiding a column per field
/// while keeping the status-by-id queries indexed.
#[derive(FromRow)]
pub(crate) struct ProfileRow {
    pub id: Uuid,
    pub data: Json<Profile>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        row.data.0
    }
}

#[derive(FromRow)]
pub(crate) struct JobRow {
    pub id: Uuid,
    pub data: Json<GenerationJob>,
}

impl From<JobRow> for GenerationJob {
    fn from(row: JobRow) -> Self {
        row.data.0
    }
}

#[derive(FromRow)]
pub(crate) struct EpisodeRow {
    pub id: String,
    pub data: Json<Episode>,
}

impl From<EpisodeRow> for Episode {
    fn from(row: EpisodeRow) -> Self {
        row.data.0
    }
}

#[derive(FromRow)]
pub(crate) struct TopicHistoryRow {
    #[allow(dead_code)]
    pub id: i64,
    pub data: Json<TopicHistoryEntry>,
}

impl From<TopicHistoryRow> for TopicHistoryEntry {
    fn from(row: TopicHistoryRow) -> Self {
        row.data.0
    }
}

#[derive(FromRow)]
pub(crate) struct NewsletterRow {
    #[allow(dead_code)]
    pub episode_id: String,
    pub data: Json<Newsletter>,
}

impl From<NewsletterRow> for Newsletter {
    fn from(row: NewsletterRow) -> Self {
        row.data.0
    }
}

/// Columns derived from the domain struct purely for indexing/filtering;
/// never the source of truth (that's always the `data` JSONB column).
pub(crate) struct ProfileIndex {
    pub id: Uuid,
    pub schedule_enabled: bool,
}

#[must_use]
pub(crate) fn profile_index(profile: &Profile) -> ProfileIndex {
    ProfileIndex { id: profile.id, schedule_enabled: profile.schedule.enabled }
}

pub(crate) struct JobIndex {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub target_date: NaiveDate,
    pub status: &'static str,
    pub updated_at: DateTime<Utc>,
}

#[must_use]
pub(crate) fn job_index(job: &GenerationJob, now: DateTime<Utc>) -> JobIndex {
    JobIndex {
        id: job.id,
        profile_id: job.profile_id,
        target_date: job.target_date,
        status: match job.status {
            crate::model::JobStatus::Pending => "pending",
            crate::model::JobStatus::Running => "running",
            crate::model::JobStatus::WaitingForReview => "waiting_for_review",
            crate::model::JobStatus::Resumed => "resumed",
            crate::model::JobStatus::Completed => "completed",
            crate::model::JobStatus::Failed => "failed",
            crate::model::JobStatus::Cancelled => "cancelled",
        },
        updated_at: now,
    }
}
