use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::{Episode, GenerationJob, Newsletter, Profile, TopicHistoryEntry};
use crate::store::models::{job_index, EpisodeRow, JobRow, NewsletterRow, ProfileRow, TopicHistoryRow};

/// The orchestrator is the only writer of `GenerationJob` rows; the
/// scheduler and the HTTP API read through the same trait but never
/// mutate a job directly.
#[async_trait]
pub trait Dao: Send + Sync {
    async fn create_profile(&self, profile: &Profile) -> Result<()>;
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;
    async fn list_profiles(&self) -> Result<Vec<Profile>>;
    async fn list_enabled_profiles(&self) -> Result<Vec<Profile>>;
    async fn update_profile(&self, profile: &Profile) -> Result<()>;
    async fn delete_profile(&self, id: Uuid) -> Result<()>;

    async fn create_job(&self, job: &GenerationJob) -> Result<()>;
    /// Creates `job` only if no non-terminal job already exists for its
    /// profile, returning whether it was created. Backs the scheduler's
    /// "one instance per profile at a time" trigger rule without relying on
    /// the caller to check-then-act non-atomically.
    async fn try_start_job(&self, job: &GenerationJob) -> Result<bool>;
    async fn get_job(&self, id: Uuid) -> Result<Option<GenerationJob>>;
    async fn update_job(&self, job: &GenerationJob) -> Result<()>;
    async fn list_active_jobs_for_profile(&self, profile_id: Uuid) -> Result<Vec<GenerationJob>>;
    async fn delete_old_jobs(&self, retention_days: i64) -> Result<u64>;

    async fn save_episode(&self, episode: &Episode) -> Result<()>;
    async fn get_episode(&self, id: &str) -> Result<Option<Episode>>;
    async fn list_episodes_for_profile(&self, profile_id: Uuid, limit: i64) -> Result<Vec<Episode>>;

    async fn insert_topic_history(&self, profile_id: Uuid, entry: &TopicHistoryEntry) -> Result<()>;
    async fn recent_topic_history(&self, profile_id: Uuid, limit: i64) -> Result<Vec<TopicHistoryEntry>>;

    async fn save_newsletter(&self, newsletter: &Newsletter) -> Result<()>;
    async fn get_newsletter(&self, episode_id: &str) -> Result<Option<Newsletter>>;

    /// Persists the episode, its newsletter (if one was generated), its
    /// topic-history rows and the completed job as one unit; a crash
    /// mid-write must never leave an episode without its job marked done.
    async fn persist_episode_transaction(
        &self,
        episode: &Episode,
        newsletter: Option<&Newsletter>,
        history: &[TopicHistoryEntry],
        job: &GenerationJob,
    ) -> Result<()>;
}

pub struct PostgresDao {
    pool: PgPool,
}

impl PostgresDao {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Dao for PostgresDao {
    async fn create_profile(&self, profile: &Profile) -> Result<()> {
        let index = crate::store::models::profile_index(profile);
        sqlx::query(
            r"
            INSERT INTO profiles (id, schedule_enabled, data)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(index.id)
        .bind(index.schedule_enabled)
        .bind(Json(profile))
        .execute(&self.pool)
        .await
        .context("failed to insert profile")?;
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>("SELECT id, data FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load profile")?;
        Ok(row.map(Profile::from))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>("SELECT id, data FROM profiles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("failed to list profiles")?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn list_enabled_profiles(&self) -> Result<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, data FROM profiles WHERE schedule_enabled = true ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list enabled profiles")?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        let index = crate::store::models::profile_index(profile);
        sqlx::query(
            r"
            UPDATE profiles SET schedule_enabled = $2, data = $3
            WHERE id = $1
            ",
        )
        .bind(index.id)
        .bind(index.schedule_enabled)
        .bind(Json(profile))
        .execute(&self.pool)
        .await
        .context("failed to update profile")?;
        Ok(())
    }

    async fn delete_profile(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete profile")?;
        Ok(())
    }

    async fn create_job(&self, job: &GenerationJob) -> Result<()> {
        let index = job_index(job, Utc::now());
        sqlx::query(
            r"
            INSERT INTO generation_jobs (id, profile_id, target_date, status, updated_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(index.id)
        .bind(index.profile_id)
        .bind(index.target_date)
        .bind(index.status)
        .bind(index.updated_at)
        .bind(Json(job))
        .execute(&self.pool)
        .await
        .context("failed to insert job")?;
        Ok(())
    }

    async fn try_start_job(&self, job: &GenerationJob) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("failed to begin job-start transaction")?;
        let acquired = crate::util::idempotency::try_acquire_job_lock(&mut tx, job.profile_id)
            .await
            .context("failed to acquire job-start lock")?;
        if !acquired {
            return Ok(false);
        }

        let existing = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM generation_jobs
            WHERE profile_id = $1 AND status NOT IN ('completed', 'failed', 'cancelled')
            ",
        )
        .bind(job.profile_id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to check for an active job")?;
        if existing > 0 {
            return Ok(false);
        }

        let index = job_index(job, Utc::now());
        sqlx::query(
            r"
            INSERT INTO generation_jobs (id, profile_id, target_date, status, updated_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(index.id)
        .bind(index.profile_id)
        .bind(index.target_date)
        .bind(index.status)
        .bind(index.updated_at)
        .bind(Json(job))
        .execute(&mut *tx)
        .await
        .context("failed to insert job")?;

        tx.commit().await.context("failed to commit job-start transaction")?;
        Ok(true)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT id, data FROM generation_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load job")?;
        Ok(row.map(GenerationJob::from))
    }

    async fn update_job(&self, job: &GenerationJob) -> Result<()> {
        let index = job_index(job, Utc::now());
        sqlx::query(
            r"
            UPDATE generation_jobs SET status = $2, updated_at = $3, data = $4
            WHERE id = $1
            ",
        )
        .bind(index.id)
        .bind(index.status)
        .bind(index.updated_at)
        .bind(Json(job))
        .execute(&self.pool)
        .await
        .context("failed to update job")?;
        Ok(())
    }

    async fn list_active_jobs_for_profile(&self, profile_id: Uuid) -> Result<Vec<GenerationJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r"
            SELECT id, data FROM generation_jobs
            WHERE profile_id = $1
              AND status NOT IN ('completed', 'failed', 'cancelled')
            ORDER BY target_date DESC
            ",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list active jobs")?;
        Ok(rows.into_iter().map(GenerationJob::from).collect())
    }

    async fn delete_old_jobs(&self, retention_days: i64) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM generation_jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND updated_at < NOW() - make_interval(days => $1)
            ",
        )
        .bind(retention_days as f64)
        .execute(&self.pool)
        .await
        .context("failed to delete old jobs")?;
        Ok(result.rows_affected())
    }

    async fn save_episode(&self, episode: &Episode) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO episodes (id, profile_id, date, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
            ",
        )
        .bind(&episode.id)
        .bind(episode.profile_id)
        .bind(episode.date)
        .bind(Json(episode))
        .execute(&self.pool)
        .await
        .context("failed to save episode")?;
        Ok(())
    }

    async fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        let row = sqlx::query_as::<_, EpisodeRow>("SELECT id, data FROM episodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load episode")?;
        Ok(row.map(Episode::from))
    }

    async fn list_episodes_for_profile(&self, profile_id: Uuid, limit: i64) -> Result<Vec<Episode>> {
        let rows = sqlx::query_as::<_, EpisodeRow>(
            r"
            SELECT id, data FROM episodes
            WHERE profile_id = $1
            ORDER BY date DESC
            LIMIT $2
            ",
        )
        .bind(profile_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list episodes")?;
        Ok(rows.into_iter().map(Episode::from).collect())
    }

    async fn insert_topic_history(&self, profile_id: Uuid, entry: &TopicHistoryEntry) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO topic_history (profile_id, episode_id, data)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(profile_id)
        .bind(&entry.episode_id)
        .bind(Json(entry))
        .execute(&self.pool)
        .await
        .context("failed to insert topic history entry")?;
        Ok(())
    }

    async fn recent_topic_history(&self, profile_id: Uuid, limit: i64) -> Result<Vec<TopicHistoryEntry>> {
        let rows = sqlx::query_as::<_, TopicHistoryRow>(
            r"
            SELECT id, data FROM topic_history
            WHERE profile_id = $1
            ORDER BY id DESC
            LIMIT $2
            ",
        )
        .bind(profile_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to load topic history")?;
        Ok(rows.into_iter().map(TopicHistoryEntry::from).collect())
    }

    async fn save_newsletter(&self, newsletter: &Newsletter) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO newsletters (episode_id, profile_id, issue_date, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (episode_id) DO UPDATE SET data = EXCLUDED.data
            ",
        )
        .bind(&newsletter.episode_id)
        .bind(newsletter.profile_id)
        .bind(newsletter.issue_date)
        .bind(Json(newsletter))
        .execute(&self.pool)
        .await
        .context("failed to save newsletter")?;
        Ok(())
    }

    async fn get_newsletter(&self, episode_id: &str) -> Result<Option<Newsletter>> {
        let row =
            sqlx::query_as::<_, NewsletterRow>("SELECT episode_id, data FROM newsletters WHERE episode_id = $1")
                .bind(episode_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to load newsletter")?;
        Ok(row.map(Newsletter::from))
    }

    async fn persist_episode_transaction(
        &self,
        episode: &Episode,
        newsletter: Option<&Newsletter>,
        history: &[TopicHistoryEntry],
        job: &GenerationJob,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin persist transaction")?;

        sqlx::query(
            r"
            INSERT INTO episodes (id, profile_id, date, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
            ",
        )
        .bind(&episode.id)
        .bind(episode.profile_id)
        .bind(episode.date)
        .bind(Json(episode))
        .execute(&mut *tx)
        .await
        .context("failed to insert episode in transaction")?;

        if let Some(newsletter) = newsletter {
            sqlx::query(
                r"
                INSERT INTO newsletters (episode_id, profile_id, issue_date, data)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (episode_id) DO UPDATE SET data = EXCLUDED.data
                ",
            )
            .bind(&newsletter.episode_id)
            .bind(newsletter.profile_id)
            .bind(newsletter.issue_date)
            .bind(Json(newsletter))
            .execute(&mut *tx)
            .await
            .context("failed to insert newsletter in transaction")?;
        }

        for entry in history {
            sqlx::query(
                r"
                INSERT INTO topic_history (profile_id, episode_id, data)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(episode.profile_id)
            .bind(&entry.episode_id)
            .bind(Json(entry))
            .execute(&mut *tx)
            .await
            .context("failed to insert topic history in transaction")?;
        }

        let index = job_index(job, Utc::now());
        sqlx::query(
            r"
            UPDATE generation_jobs SET status = $2, updated_at = $3, data = $4
            WHERE id = $1
            ",
        )
        .bind(index.id)
        .bind(index.status)
        .bind(index.updated_at)
        .bind(Json(job))
        .execute(&mut *tx)
        .await
        .context("failed to mark job complete in transaction")?;

        tx.commit().await.context("failed to commit persist transaction")?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) struct InMemoryDao {
    profiles: tokio::sync::Mutex<std::collections::HashMap<Uuid, Profile>>,
    jobs: tokio::sync::Mutex<std::collections::HashMap<Uuid, GenerationJob>>,
    episodes: tokio::sync::Mutex<std::collections::HashMap<String, Episode>>,
    newsletters: tokio::sync::Mutex<std::collections::HashMap<String, Newsletter>>,
    topic_history: tokio::sync::Mutex<Vec<(Uuid, TopicHistoryEntry)>>,
}

#[cfg(test)]
impl InMemoryDao {
    pub(crate) fn new() -> Self {
        Self {
            profiles: tokio::sync::Mutex::new(std::collections::HashMap::new()),
            jobs: tokio::sync::Mutex::new(std::collections::HashMap::new()),
            episodes: tokio::sync::Mutex::new(std::collections::HashMap::new()),
            newsletters: tokio::sync::Mutex::new(std::collections::HashMap::new()),
            topic_history: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Dao for InMemoryDao {
    async fn create_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles.lock().await.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.lock().await.get(&id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.lock().await.values().cloned().collect())
    }

    async fn list_enabled_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.lock().await.values().filter(|p| p.schedule.enabled).cloned().collect())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles.lock().await.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn delete_profile(&self, id: Uuid) -> Result<()> {
        self.profiles.lock().await.remove(&id);
        self.jobs.lock().await.retain(|_, j| j.profile_id != id);
        self.episodes.lock().await.retain(|_, e| e.profile_id != id);
        self.topic_history.lock().await.retain(|(p, _)| *p != id);
        Ok(())
    }

    async fn create_job(&self, job: &GenerationJob) -> Result<()> {
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn try_start_job(&self, job: &GenerationJob) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        if jobs.values().any(|j| j.profile_id == job.profile_id && !j.status.is_terminal()) {
            return Ok(false);
        }
        jobs.insert(job.id, job.clone());
        Ok(true)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn update_job(&self, job: &GenerationJob) -> Result<()> {
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn list_active_jobs_for_profile(&self, profile_id: Uuid) -> Result<Vec<GenerationJob>> {
        Ok(self
            .jobs
            .lock()
            .await
            .values()
            .filter(|j| j.profile_id == profile_id && !j.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn delete_old_jobs(&self, _retention_days: i64) -> Result<u64> {
        Ok(0)
    }

    async fn save_episode(&self, episode: &Episode) -> Result<()> {
        self.episodes.lock().await.insert(episode.id.clone(), episode.clone());
        Ok(())
    }

    async fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        Ok(self.episodes.lock().await.get(id).cloned())
    }

    async fn list_episodes_for_profile(&self, profile_id: Uuid, limit: i64) -> Result<Vec<Episode>> {
        let mut episodes: Vec<Episode> =
            self.episodes.lock().await.values().filter(|e| e.profile_id == profile_id).cloned().collect();
        episodes.sort_by(|a, b| b.date.cmp(&a.date));
        episodes.truncate(limit.max(0) as usize);
        Ok(episodes)
    }

    async fn insert_topic_history(&self, profile_id: Uuid, entry: &TopicHistoryEntry) -> Result<()> {
        self.topic_history.lock().await.push((profile_id, entry.clone()));
        Ok(())
    }

    async fn recent_topic_history(&self, profile_id: Uuid, limit: i64) -> Result<Vec<TopicHistoryEntry>> {
        let history = self.topic_history.lock().await;
        Ok(history
            .iter()
            .rev()
            .filter(|(p, _)| *p == profile_id)
            .take(limit.max(0) as usize)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn save_newsletter(&self, newsletter: &Newsletter) -> Result<()> {
        self.newsletters.lock().await.insert(newsletter.episode_id.clone(), newsletter.clone());
        Ok(())
    }

    async fn get_newsletter(&self, episode_id: &str) -> Result<Option<Newsletter>> {
        Ok(self.newsletters.lock().await.get(episode_id).cloned())
    }

    async fn persist_episode_transaction(
        &self,
        episode: &Episode,
        newsletter: Option<&Newsletter>,
        history: &[TopicHistoryEntry],
        job: &GenerationJob,
    ) -> Result<()> {
        self.episodes.lock().await.insert(episode.id.clone(), episode.clone());
        if let Some(newsletter) = newsletter {
            self.newsletters.lock().await.insert(newsletter.episode_id.clone(), newsletter.clone());
        }
        {
            let mut guard = self.topic_history.lock().await;
            for entry in history {
                guard.push((episode.profile_id, entry.clone()));
            }
        }
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(())
    }
}
