//! Job orchestrator. Drives one `GenerationJob` through the fixed nine-stage
//! state machine, pausing for editorial review and persisting the finished
//! episode atomically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::model::{
    AvoidanceKind, Episode, EpisodeStatus, GenerationJob, JobOptions, JobStatus, LogLevel, PodcastScript, Profile, Stage,
    SuggestedTone, TopicAvoidanceRule, TopicCluster, TopicHistoryEntry, VerifiedTopic,
};
use crate::pipeline::aggregation::AggregationStage;
use crate::pipeline::audio::AudioStage;
use crate::pipeline::clustering::ClusteringStage;
use crate::pipeline::newsletter::NewsletterStage;
use crate::pipeline::research::{depth_for, ResearchStage};
use crate::pipeline::scripting::{ScriptingStage, TopicForScript};
use crate::store::Dao;

#[derive(Clone)]
pub struct PipelineOrchestrator {
    dao: Arc<dyn Dao>,
    aggregation: Arc<dyn AggregationStage>,
    clustering: Arc<dyn ClusteringStage>,
    research: Arc<dyn ResearchStage>,
    scripting: Arc<dyn ScriptingStage>,
    audio: Arc<dyn AudioStage>,
    newsletter: Arc<dyn NewsletterStage>,
    output_root: PathBuf,
    activity_log_max_entries: usize,
    tts_parallelism: usize,
    fetch_limit_per_source: usize,
}

impl PipelineOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dao: Arc<dyn Dao>,
        aggregation: Arc<dyn AggregationStage>,
        clustering: Arc<dyn ClusteringStage>,
        research: Arc<dyn ResearchStage>,
        scripting: Arc<dyn ScriptingStage>,
        audio: Arc<dyn AudioStage>,
        newsletter: Arc<dyn NewsletterStage>,
        output_root: impl Into<PathBuf>,
        activity_log_max_entries: usize,
        tts_parallelism: usize,
    ) -> Self {
        Self {
            dao,
            aggregation,
            clustering,
            research,
            scripting,
            audio,
            newsletter,
            output_root: output_root.into(),
            activity_log_max_entries,
            tts_parallelism,
            fetch_limit_per_source: 50,
        }
    }

    /// Creates a job and starts running it in the background. Refuses to
    /// start a second job for a profile that already has one active.
    ///
    /// # Errors
    /// Returns an error when the profile does not exist, or when a job is
    /// already active for it.
    pub async fn start(&self, profile_id: Uuid, options: JobOptions) -> Result<Uuid> {
        let profile = self.dao.get_profile(profile_id).await?.context("profile not found")?;
        let target_date = Utc::now().date_naive();
        let job = GenerationJob::new(profile.id, target_date, options, Utc::now());
        let job_id = job.id;

        if !self.dao.try_start_job(&job).await? {
            bail!("a job is already active for profile {profile_id}");
        }

        let this = self.clone();
        tokio::spawn(async move { this.drive(job_id).await });
        Ok(job_id)
    }

    /// # Errors
    /// Returns an error when the Dao lookup itself fails.
    pub async fn get_status(&self, job_id: Uuid) -> Result<Option<GenerationJob>> {
        self.dao.get_job(job_id).await
    }

    /// Marks a non-terminal job cancelled. The running stage, if any, is not
    /// interrupted mid-flight; the orchestrator notices at the next stage
    /// boundary.
    ///
    /// # Errors
    /// Returns an error when the Dao write fails.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let Some(mut job) = self.dao.get_job(job_id).await? else { return Ok(false) };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        job.log("cancelled", LogLevel::Warn, Utc::now(), self.activity_log_max_entries);
        self.dao.update_job(&job).await?;
        Ok(true)
    }

    /// Resumes a job paused at the review stage, optionally overwriting its
    /// script with editorial edits, and carries it through audio rendering
    /// and persistence.
    ///
    /// # Errors
    /// Returns an error when the job isn't awaiting review, or its profile
    /// or on-disk script can no longer be found.
    pub async fn approve(&self, job_id: Uuid, edited_script: Option<PodcastScript>) -> Result<()> {
        let mut job = self.dao.get_job(job_id).await?.context("job not found")?;
        if job.status != JobStatus::WaitingForReview {
            bail!("job {job_id} is not awaiting review");
        }
        let episode_id = job.episode_id.clone().context("review job missing episode id")?;
        let profile = self.dao.get_profile(job.profile_id).await?.context("profile not found")?;

        let script = match edited_script {
            Some(script) => {
                self.write_script(&episode_id, &script).await?;
                script
            }
            None => self.read_script(&episode_id).await?,
        };

        job.status = JobStatus::Resumed;
        job.log("approved, resuming", LogLevel::Info, Utc::now(), self.activity_log_max_entries);
        self.dao.update_job(&job).await?;

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(error) = this.clone().continue_after_review(job, profile, script).await {
                this.mark_failed(job_id, &error).await;
            }
        });
        Ok(())
    }

    /// Marks orphaned `pending`/`running` jobs failed at startup: a restart
    /// never resumes mid-flight work.
    ///
    /// # Errors
    /// Returns an error when listing profiles or updating a job fails.
    pub async fn reconcile_orphans(&self) -> Result<u64> {
        let mut reconciled = 0u64;
        for profile in self.dao.list_profiles().await? {
            for mut job in self.dao.list_active_jobs_for_profile(profile.id).await? {
                if matches!(job.status, JobStatus::Pending | JobStatus::Running) {
                    job.status = JobStatus::Failed;
                    job.error_message = Some("interrupted by restart".to_string());
                    job.is_recoverable = false;
                    job.completed_at = Some(Utc::now());
                    job.log("interrupted by restart", LogLevel::Error, Utc::now(), self.activity_log_max_entries);
                    self.dao.update_job(&job).await?;
                    reconciled += 1;
                }
            }
        }
        if reconciled > 0 {
            warn!(reconciled, "marked orphaned jobs failed on startup");
        }
        Ok(reconciled)
    }

    async fn drive(&self, job_id: Uuid) {
        if let Err(error) = self.run(job_id).await {
            error!(%job_id, error = %error, "job failed");
            self.mark_failed(job_id, &error).await;
        }
    }

    async fn mark_failed(&self, job_id: Uuid, error: &anyhow::Error) {
        let Ok(Some(mut job)) = self.dao.get_job(job_id).await else { return };
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        job.is_recoverable = !crate::util::error::is_fatal(error);
        job.completed_at = Some(Utc::now());
        job.log(format!("failed: {error}"), LogLevel::Error, Utc::now(), self.activity_log_max_entries);
        let _ = self.dao.update_job(&job).await;
    }

    async fn run(&self, job_id: Uuid) -> Result<()> {
        let mut job = self.dao.get_job(job_id).await?.context("job vanished before it could run")?;
        let profile = self.dao.get_profile(job.profile_id).await?.context("profile vanished")?;

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        self.enter_stage(&mut job, Stage::Initializing, "job started").await?;
        self.complete_stage(&mut job, Stage::Initializing, "initialized").await?;

        self.enter_stage(&mut job, Stage::Aggregation, "fetching content from sources").await?;
        let items = self.aggregation.fetch_all(self.fetch_limit_per_source).await;
        self.complete_stage(&mut job, Stage::Aggregation, format!("fetched {} items", items.len())).await?;
        if self.check_cancelled(&mut job).await? {
            return Ok(());
        }

        let previous_episodes = self.dao.recent_topic_history(profile.id, 10).await?;

        self.enter_stage(&mut job, Stage::Clustering, "clustering topics").await?;
        let mut clusters = self.clustering.cluster(items).await?;
        clusters.sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap_or(std::cmp::Ordering::Equal));
        let before_avoidance = clusters.len();
        clusters = apply_avoidance_rules(clusters, &profile.avoidance_rules, &previous_episodes, Utc::now());
        if clusters.len() < before_avoidance {
            info!(%job_id, dropped = before_avoidance - clusters.len(), "clusters dropped by topic avoidance rules");
        }
        let topic_count = profile.topic_count.max(1) as usize;
        clusters.truncate(job.options.topic_count.map_or(topic_count, |n| n as usize));
        self.complete_stage(&mut job, Stage::Clustering, format!("{} topics selected", clusters.len())).await?;
        if self.check_cancelled(&mut job).await? {
            return Ok(());
        }

        self.enter_stage(&mut job, Stage::Research, "researching topics").await?;
        let mut researched = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let mut depth = depth_for(cluster);
            if job.options.deep_research && depth == crate::model::ResearchDepth::Standard {
                depth = crate::model::ResearchDepth::Deep;
            }
            match self.research.research(cluster, depth, job.options.deep_research).await {
                Ok(topic) => researched.push((cluster.clone(), topic)),
                Err(error) => warn!(cluster = %cluster.id, error = %error, "research failed for cluster, dropping topic"),
            }
        }
        self.complete_stage(&mut job, Stage::Research, format!("researched {} topics", researched.len())).await?;
        if self.check_cancelled(&mut job).await? {
            return Ok(());
        }

        self.enter_stage(&mut job, Stage::Scripting, "writing script").await?;
        let duration_minutes = job.options.duration_minutes.unwrap_or(profile.target_duration_minutes).max(1);
        let verified: Vec<VerifiedTopic> = verify_topics(&researched, duration_minutes);
        let topics_for_script: Vec<TopicForScript<'_>> = verified
            .iter()
            .zip(researched.iter())
            .map(|(verified, (_, researched))| TopicForScript { verified, researched })
            .collect();
        let script = self
            .scripting
            .synthesize(&profile, &topics_for_script, &previous_episodes, job.target_date, job.options.auto_editorial_pass)
            .await?;
        self.write_script(&script.episode_id, &script).await?;
        job.episode_id = Some(script.episode_id.clone());
        self.complete_stage(&mut job, Stage::Scripting, "script ready").await?;
        if self.check_cancelled(&mut job).await? {
            return Ok(());
        }

        if job.options.editorial_review {
            self.enter_stage(&mut job, Stage::Review, "paused for editorial review").await?;
            job.status = JobStatus::WaitingForReview;
            self.dao.update_job(&job).await?;
            info!(%job_id, episode_id = %script.episode_id, "job paused for editorial review");
            return Ok(());
        }

        self.enter_stage(&mut job, Stage::Review, "editorial review not requested").await?;
        self.complete_stage(&mut job, Stage::Review, "editorial review skipped").await?;

        self.continue_after_review(job, profile, script).await
    }

    async fn continue_after_review(&self, mut job: GenerationJob, profile: Profile, script: PodcastScript) -> Result<()> {
        if job.status == JobStatus::Resumed {
            job.status = JobStatus::Running;
        }

        let episode_dir = self.output_root.join("audio").join(&script.episode_id);
        let (stitched_audio_path, duration_seconds, segments_transcript) = if job.options.generate_audio {
            self.enter_stage(&mut job, Stage::Audio, "rendering audio").await?;
            let voice_by_speaker = voice_map(&profile);
            let rendered = self
                .audio
                .render(&script, &episode_dir, self.tts_parallelism, &voice_by_speaker, job.options.tts_model.as_deref())
                .await?;
            let canonical_path = self.output_root.join("episodes").join(format!("{}.wav", script.episode_id));
            if let Some(stitched) = &rendered.stitched_file_path {
                if let Some(parent) = canonical_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let bytes = tokio::fs::read(stitched).await?;
                tokio::fs::write(&canonical_path, bytes).await?;
            }
            self.complete_stage(&mut job, Stage::Audio, "audio rendered").await?;
            if self.check_cancelled(&mut job).await? {
                return Ok(());
            }
            (
                rendered.stitched_file_path.as_ref().map(|_| canonical_path.to_string_lossy().to_string()),
                rendered.total_duration_seconds,
                rendered.segments.iter().map(|s| s.transcript.clone()).collect::<Vec<_>>().join(" "),
            )
        } else {
            self.enter_stage(&mut job, Stage::Audio, "audio generation not requested").await?;
            self.complete_stage(&mut job, Stage::Audio, "audio skipped").await?;
            (None, f64::from(script.duration_estimate_seconds), String::new())
        };

        self.enter_stage(&mut job, Stage::Persisting, "persisting episode").await?;

        let newsletter = match self.newsletter.generate(&profile, &script).await {
            Ok(newsletter) => {
                if let Err(error) = self.write_newsletter(&newsletter).await {
                    warn!(job_id = %job.id, error = %error, "failed to write newsletter to disk");
                }
                Some(newsletter)
            }
            Err(error) => {
                warn!(job_id = %job.id, error = %error, "newsletter generation failed, episode persists without one");
                None
            }
        };

        let summary = if segments_transcript.is_empty() {
            script.segments.iter().map(|s| s.topic_title.clone()).collect::<Vec<_>>().join("; ")
        } else {
            segments_transcript
        };

        let episode = Episode {
            id: script.episode_id.clone(),
            profile_id: profile.id,
            title: script.title.clone(),
            date: job.target_date,
            topics_covered: script.segments.iter().map(|s| s.topic_title.clone()).collect(),
            script_json: serde_json::to_value(&script).unwrap_or_default(),
            summary,
            key_facts: script
                .segments
                .iter()
                .flat_map(|s| s.dialogue.iter().map(|d| d.text.clone()))
                .take(10)
                .collect(),
            stitched_audio_path,
            duration_seconds,
            status: EpisodeStatus::Published,
        };

        let history: Vec<TopicHistoryEntry> = script
            .segments
            .iter()
            .map(|segment| TopicHistoryEntry {
                episode_id: episode.id.clone(),
                title: segment.topic_title.clone(),
                category: String::new(),
                summary: segment.dialogue.iter().map(|d| d.text.clone()).collect::<Vec<_>>().join(" "),
                key_points: Vec::new(),
                facts_mentioned: Vec::new(),
                ongoing: false,
                follow_up_notes: None,
                importance: 0.5,
            })
            .collect();

        job.complete_stage(Stage::Persisting);
        job.enter_stage(Stage::Done);
        job.complete_stage(Stage::Done);
        job.status = JobStatus::Completed;
        job.episode_id = Some(episode.id.clone());
        job.completed_at = Some(Utc::now());
        job.log("episode persisted", LogLevel::Success, Utc::now(), self.activity_log_max_entries);

        self.dao.persist_episode_transaction(&episode, newsletter.as_ref(), &history, &job).await
    }

    fn newsletter_path(&self, episode_id: &str) -> PathBuf {
        self.output_root.join("newsletters").join(crate::pipeline::newsletter::file_name(episode_id))
    }

    async fn write_newsletter(&self, newsletter: &crate::model::Newsletter) -> Result<()> {
        let path = self.newsletter_path(&newsletter.episode_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, newsletter.to_markdown()).await.context("failed to write newsletter to disk")
    }

    async fn enter_stage(&self, job: &mut GenerationJob, stage: Stage, message: impl Into<String>) -> Result<()> {
        job.enter_stage(stage);
        job.log(message, LogLevel::Info, Utc::now(), self.activity_log_max_entries);
        self.dao.update_job(job).await
    }

    async fn complete_stage(&self, job: &mut GenerationJob, stage: Stage, message: impl Into<String>) -> Result<()> {
        job.complete_stage(stage);
        job.log(message, LogLevel::Success, Utc::now(), self.activity_log_max_entries);
        self.dao.update_job(job).await
    }

    /// # Errors
    /// Returns an error when the Dao lookup fails.
    async fn check_cancelled(&self, job: &mut GenerationJob) -> Result<bool> {
        if let Some(current) = self.dao.get_job(job.id).await? {
            if current.status == JobStatus::Cancelled {
                *job = current;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn script_path(&self, episode_id: &str) -> PathBuf {
        self.output_root.join("scripts").join(format!("{episode_id}.json"))
    }

    async fn write_script(&self, episode_id: &str, script: &PodcastScript) -> Result<()> {
        let path = self.script_path(episode_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(script).context("failed to serialize script")?;
        tokio::fs::write(&path, json).await.context("failed to write script to disk")
    }

    async fn read_script(&self, episode_id: &str) -> Result<PodcastScript> {
        let path = self.script_path(episode_id);
        let bytes = tokio::fs::read(&path).await.with_context(|| format!("failed to read script at {}", path.display()))?;
        serde_json::from_slice(&bytes).context("failed to deserialize script")
    }
}

fn voice_map(profile: &Profile) -> HashMap<String, String> {
    profile.hosts.iter().map(|h| (h.name.clone(), h.voice_id.clone())).collect()
}

/// Drops clusters matching an active `Permanent`/unexpired `Temporary` rule
/// and `ReduceFrequency` clusters mentioned within the rule's trailing
/// window, approximated against the `min_days_between_mentions` most recent
/// history entries (one entry per prior episode, which the scheduler runs
/// at most once a day).
fn apply_avoidance_rules(
    clusters: Vec<TopicCluster>,
    rules: &[TopicAvoidanceRule],
    recent_history: &[TopicHistoryEntry],
    now: chrono::DateTime<Utc>,
) -> Vec<TopicCluster> {
    if rules.is_empty() {
        return clusters;
    }
    clusters.into_iter().filter(|cluster| !is_avoided(cluster, rules, recent_history, now)).collect()
}

fn is_avoided(
    cluster: &TopicCluster,
    rules: &[TopicAvoidanceRule],
    recent_history: &[TopicHistoryEntry],
    now: chrono::DateTime<Utc>,
) -> bool {
    let haystack = format!("{} {} {}", cluster.name, cluster.category, cluster.summary).to_lowercase();
    rules.iter().any(|rule| {
        let keyword = rule.keyword.to_lowercase();
        if keyword.is_empty() || !haystack.contains(&keyword) {
            return false;
        }
        match rule.kind {
            AvoidanceKind::Permanent => true,
            AvoidanceKind::Temporary => rule.until.is_none_or(|until| now < until),
            AvoidanceKind::ReduceFrequency => {
                let window = rule.min_days_between_mentions.unwrap_or(0) as usize;
                window > 0
                    && recent_history.iter().take(window).any(|entry| {
                        entry.title.to_lowercase().contains(&keyword) || entry.summary.to_lowercase().contains(&keyword)
                    })
            }
        }
    })
}

/// Turns researched clusters into editorially-ranked `VerifiedTopic`s:
/// priority follows cluster rank, tone follows whether the topic is
/// breaking, and duration is split evenly across the episode.
fn verify_topics(
    researched: &[(crate::model::TopicCluster, crate::model::ResearchedTopic)],
    target_duration_minutes: u32,
) -> Vec<VerifiedTopic> {
    let topic_count = researched.len().max(1);
    let per_topic_seconds = (u64::from(target_duration_minutes) * 60 / topic_count as u64) as u32;
    researched
        .iter()
        .enumerate()
        .map(|(index, (cluster, topic))| VerifiedTopic {
            cluster_id: cluster.id.clone(),
            final_headline: topic.headline.clone(),
            final_summary: topic.summary.clone(),
            suggested_tone: if cluster.is_breaking { SuggestedTone::Urgent } else { SuggestedTone::Conversational },
            suggested_duration_seconds: per_topic_seconds,
            key_talking_points: topic.facts.iter().map(|f| f.claim.clone()).take(5).collect(),
            priority_rank: index as u32 + 1,
            editorial_score: topic.quality.fact_density,
            approved: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{
        AudioEpisode, AudioSegment, DialogueLine, RawContentItem, ResearchDepth, ResearchQuality, ResearchedTopic,
        ScriptSegment, SegmentContentType, TopicCluster,
    };
    use crate::store::InMemoryDao;

    struct FakeAggregation;
    #[async_trait]
    impl AggregationStage for FakeAggregation {
        async fn fetch_all(&self, _limit_per_source: usize) -> Vec<RawContentItem> {
            Vec::new()
        }
    }

    struct FakeClustering {
        cluster: TopicCluster,
    }
    #[async_trait]
    impl ClusteringStage for FakeClustering {
        async fn cluster(&self, _items: Vec<RawContentItem>) -> Result<Vec<TopicCluster>> {
            Ok(vec![self.cluster.clone()])
        }
    }

    struct FakeResearch;
    #[async_trait]
    impl ResearchStage for FakeResearch {
        async fn research(
            &self,
            cluster: &TopicCluster,
            _depth: ResearchDepth,
            _include_counter_arguments: bool,
        ) -> Result<ResearchedTopic> {
            Ok(ResearchedTopic {
                cluster_id: cluster.id.clone(),
                headline: format!("headline for {}", cluster.name),
                summary: "summary".to_string(),
                background: "background".to_string(),
                current_situation: "situation".to_string(),
                implications: "implications".to_string(),
                facts: Vec::new(),
                opinions: Vec::new(),
                counter_arguments: Vec::new(),
                community_sentiment: "neutral".to_string(),
                depth: ResearchDepth::Standard,
                sources_consulted: 1,
                quality: ResearchQuality::default(),
            })
        }
    }

    struct FakeScripting;
    #[async_trait]
    impl ScriptingStage for FakeScripting {
        async fn synthesize(
            &self,
            _profile: &Profile,
            topics: &[TopicForScript<'_>],
            _previous_episodes: &[TopicHistoryEntry],
            target_date: NaiveDate,
            _auto_editorial_pass: bool,
        ) -> Result<PodcastScript> {
            Ok(PodcastScript {
                episode_id: "ep-test-1".to_string(),
                title: "Test Episode".to_string(),
                episode_date: target_date,
                duration_estimate_seconds: 600,
                intro: vec![DialogueLine { speaker: "Host".to_string(), text: "welcome".to_string(), emotion: None }],
                segments: topics
                    .iter()
                    .map(|t| ScriptSegment {
                        topic_id: t.verified.cluster_id.clone(),
                        topic_title: t.verified.final_headline.clone(),
                        duration_estimate_seconds: t.verified.suggested_duration_seconds,
                        dialogue: vec![DialogueLine { speaker: "Host".to_string(), text: "discussion".to_string(), emotion: None }],
                    })
                    .collect(),
                outro: vec![DialogueLine { speaker: "Host".to_string(), text: "goodbye".to_string(), emotion: None }],
            })
        }
    }

    struct FakeAudio {
        called: Arc<Mutex<bool>>,
    }
    #[async_trait]
    impl AudioStage for FakeAudio {
        async fn render(
            &self,
            script: &PodcastScript,
            _output_dir: &Path,
            _tts_parallelism: usize,
            _voice_by_speaker: &HashMap<String, String>,
            _tts_model: Option<&str>,
        ) -> Result<AudioEpisode> {
            *self.called.lock().unwrap() = true;
            Ok(AudioEpisode {
                episode_id: script.episode_id.clone(),
                segments: vec![AudioSegment {
                    sequence_index: 0,
                    topic_id: None,
                    title: "intro".to_string(),
                    content_type: SegmentContentType::Intro,
                    file_path: "/tmp/does-not-exist.wav".to_string(),
                    duration_seconds: 10.0,
                    transcript: "welcome".to_string(),
                    start_time_seconds: 0.0,
                }],
                stitched_file_path: None,
                total_duration_seconds: 600.0,
            })
        }
    }

    struct FakeNewsletter;
    #[async_trait]
    impl NewsletterStage for FakeNewsletter {
        async fn generate(&self, profile: &Profile, script: &PodcastScript) -> Result<crate::model::Newsletter> {
            let mut newsletter = crate::model::Newsletter {
                episode_id: script.episode_id.clone(),
                profile_id: profile.id,
                issue_date: script.episode_date,
                title: format!("{}: {}", profile.display_name, script.title),
                subtitle: "Test subtitle".to_string(),
                intro: "intro".to_string(),
                sections: Vec::new(),
                outro: "outro".to_string(),
                total_word_count: 0,
                reading_time_minutes: 0,
            };
            newsletter.calculate_stats();
            Ok(newsletter)
        }
    }

    fn sample_cluster() -> TopicCluster {
        TopicCluster {
            id: "cluster-1".to_string(),
            name: "Test Topic".to_string(),
            summary: "summary".to_string(),
            category: "general".to_string(),
            members: Vec::new(),
            centroid: Vec::new(),
            coherence: 0.9,
            total_engagement: 100.0,
            source_diversity: 2,
            earliest_published: Utc::now(),
            latest_published: Utc::now(),
            is_breaking: false,
            is_trending: false,
            priority_score: 5.0,
        }
    }

    fn sample_profile() -> Profile {
        use crate::model::Schedule;
        Profile {
            id: Uuid::new_v4(),
            display_name: "Daily Brief".to_string(),
            tone: "conversational".to_string(),
            target_audience: "general".to_string(),
            target_duration_minutes: 10,
            topic_count: 3,
            hosts: vec![crate::model::Host {
                name: "Host".to_string(),
                persona: "curious".to_string(),
                voice_id: "voice-1".to_string(),
                speaking_style: "casual".to_string(),
                expertise_tags: Vec::new(),
            }],
            sources: Vec::new(),
            avoidance_rules: Vec::new(),
            schedule: Schedule {
                enabled: true,
                hour: 4,
                minute: 0,
                weekdays: vec![],
                timezone: "UTC".to_string(),
                last_run: None,
            },
        }
    }

    fn orchestrator(audio_called: Arc<Mutex<bool>>, output_root: &std::path::Path) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            Arc::new(InMemoryDao::new()),
            Arc::new(FakeAggregation),
            Arc::new(FakeClustering { cluster: sample_cluster() }),
            Arc::new(FakeResearch),
            Arc::new(FakeScripting),
            Arc::new(FakeAudio { called: audio_called }),
            Arc::new(FakeNewsletter),
            output_root,
            200,
            3,
        )
    }

    #[tokio::test]
    async fn start_runs_job_to_completion_without_review() {
        let tmp = std::env::temp_dir().join(format!("podcast-forge-test-{}", Uuid::new_v4()));
        let audio_called = Arc::new(Mutex::new(false));
        let orchestrator = orchestrator(Arc::clone(&audio_called), &tmp);
        let dao = Arc::clone(&orchestrator.dao);
        let profile = sample_profile();
        dao.create_profile(&profile).await.unwrap();

        let job_id = orchestrator.start(profile.id, JobOptions::default()).await.unwrap();

        let mut job = None;
        for _ in 0..200 {
            let current = orchestrator.get_status(job_id).await.unwrap();
            if let Some(current) = &current {
                if current.status.is_terminal() {
                    job = current.clone().into();
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let job = job.expect("job should reach a terminal status");
        assert_eq!(job.status, JobStatus::Completed);
        assert!(*audio_called.lock().unwrap());
        assert!(job.episode_id.is_some());

        let episode_id = job.episode_id.as_deref().unwrap();
        let episode = dao.get_episode(episode_id).await.unwrap();
        assert!(episode.is_some());

        let newsletter = dao.get_newsletter(episode_id).await.unwrap();
        assert!(newsletter.is_some());
        assert!(tmp.join("newsletters").join(format!("{episode_id}.md")).exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn start_refuses_second_job_for_same_profile() {
        let tmp = std::env::temp_dir().join(format!("podcast-forge-test-{}", Uuid::new_v4()));
        let audio_called = Arc::new(Mutex::new(false));
        let orchestrator = orchestrator(audio_called, &tmp);
        let dao = Arc::clone(&orchestrator.dao);
        let profile = sample_profile();
        dao.create_profile(&profile).await.unwrap();

        let job_id = orchestrator.start(profile.id, JobOptions::default()).await.unwrap();
        let second = orchestrator.start(profile.id, JobOptions::default()).await;
        assert!(second.is_err());

        for _ in 0..200 {
            if orchestrator.get_status(job_id).await.unwrap().is_some_and(|j| j.status.is_terminal()) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn approve_resumes_a_job_waiting_for_review() {
        let tmp = std::env::temp_dir().join(format!("podcast-forge-test-{}", Uuid::new_v4()));
        let audio_called = Arc::new(Mutex::new(false));
        let orchestrator = orchestrator(Arc::clone(&audio_called), &tmp);
        let dao = Arc::clone(&orchestrator.dao);
        let profile = sample_profile();
        dao.create_profile(&profile).await.unwrap();

        let job_id = orchestrator
            .start(profile.id, JobOptions { editorial_review: true, ..JobOptions::default() })
            .await
            .unwrap();

        let mut waiting = false;
        for _ in 0..200 {
            if orchestrator.get_status(job_id).await.unwrap().is_some_and(|j| j.status == JobStatus::WaitingForReview) {
                waiting = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(waiting, "job should pause awaiting review");
        assert!(!*audio_called.lock().unwrap());

        orchestrator.approve(job_id, None).await.unwrap();

        let mut completed = false;
        for _ in 0..200 {
            if orchestrator.get_status(job_id).await.unwrap().is_some_and(|j| j.status == JobStatus::Completed) {
                completed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(completed, "job should complete after approval");
        assert!(*audio_called.lock().unwrap());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn cancel_marks_a_pending_job_cancelled() {
        let tmp = std::env::temp_dir().join(format!("podcast-forge-test-{}", Uuid::new_v4()));
        let audio_called = Arc::new(Mutex::new(false));
        let orchestrator = orchestrator(audio_called, &tmp);
        let dao = Arc::clone(&orchestrator.dao);
        let job = GenerationJob::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), JobOptions::default(), Utc::now());
        dao.create_job(&job).await.unwrap();

        assert!(orchestrator.cancel(job.id).await.unwrap());
        let cancelled = orchestrator.get_status(job.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(!orchestrator.cancel(job.id).await.unwrap());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn reconcile_orphans_fails_stuck_running_jobs() {
        let tmp = std::env::temp_dir().join(format!("podcast-forge-test-{}", Uuid::new_v4()));
        let audio_called = Arc::new(Mutex::new(false));
        let orchestrator = orchestrator(audio_called, &tmp);
        let dao = Arc::clone(&orchestrator.dao);
        let profile = sample_profile();
        dao.create_profile(&profile).await.unwrap();

        let mut job = GenerationJob::new(profile.id, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), JobOptions::default(), Utc::now());
        job.status = JobStatus::Running;
        dao.create_job(&job).await.unwrap();

        let reconciled = orchestrator.reconcile_orphans().await.unwrap();
        assert_eq!(reconciled, 1);
        let after = dao.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert!(!after.is_recoverable);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn voice_map_indexes_by_host_name() {
        let profile = sample_profile();
        let map = voice_map(&profile);
        assert_eq!(map.get("Host").map(String::as_str), Some("voice-1"));
    }

    #[test]
    fn verify_topics_splits_duration_evenly_and_ranks_in_order() {
        let researched = vec![
            (sample_cluster(), placeholder_researched("cluster-1")),
            (sample_cluster(), placeholder_researched("cluster-2")),
        ];
        let verified = verify_topics(&researched, 10);
        assert_eq!(verified.len(), 2);
        assert_eq!(verified[0].priority_rank, 1);
        assert_eq!(verified[1].priority_rank, 2);
        assert_eq!(verified[0].suggested_duration_seconds, 300);
    }

    #[test]
    fn apply_avoidance_rules_drops_permanent_matches() {
        let mut cluster = sample_cluster();
        cluster.name = "Election recount drama".to_string();
        let rules = vec![TopicAvoidanceRule {
            keyword: "election recount".to_string(),
            kind: AvoidanceKind::Permanent,
            until: None,
            min_days_between_mentions: None,
        }];
        let kept = apply_avoidance_rules(vec![cluster], &rules, &[], Utc::now());
        assert!(kept.is_empty());
    }

    #[test]
    fn apply_avoidance_rules_keeps_expired_temporary_rule() {
        let mut cluster = sample_cluster();
        cluster.name = "Layoffs roundup".to_string();
        let rules = vec![TopicAvoidanceRule {
            keyword: "layoffs".to_string(),
            kind: AvoidanceKind::Temporary,
            until: Some(Utc::now() - chrono::Duration::days(1)),
            min_days_between_mentions: None,
        }];
        let kept = apply_avoidance_rules(vec![cluster], &rules, &[], Utc::now());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn apply_avoidance_rules_reduce_frequency_checks_recent_window() {
        let mut cluster = sample_cluster();
        cluster.name = "Chip shortage update".to_string();
        let rules = vec![TopicAvoidanceRule {
            keyword: "chip shortage".to_string(),
            kind: AvoidanceKind::ReduceFrequency,
            until: None,
            min_days_between_mentions: Some(2),
        }];
        let recent = vec![TopicHistoryEntry {
            episode_id: "ep-prior".to_string(),
            title: "Chip shortage explainer".to_string(),
            category: String::new(),
            summary: String::new(),
            key_points: Vec::new(),
            facts_mentioned: Vec::new(),
            ongoing: false,
            follow_up_notes: None,
            importance: 0.5,
        }];
        assert!(apply_avoidance_rules(vec![cluster.clone()], &rules, &recent, Utc::now()).is_empty());
        assert_eq!(apply_avoidance_rules(vec![cluster], &rules, &[], Utc::now()).len(), 1);
    }

    fn placeholder_researched(cluster_id: &str) -> ResearchedTopic {
        ResearchedTopic {
            cluster_id: cluster_id.to_string(),
            headline: "headline".to_string(),
            summary: "summary".to_string(),
            background: String::new(),
            current_situation: String::new(),
            implications: String::new(),
            facts: Vec::new(),
            opinions: Vec::new(),
            counter_arguments: Vec::new(),
            community_sentiment: "neutral".to_string(),
            depth: ResearchDepth::Standard,
            sources_consulted: 0,
            quality: ResearchQuality::default(),
        }
    }
}
