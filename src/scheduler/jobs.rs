use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::model::JobOptions;
use crate::pipeline::PipelineOrchestrator;
use crate::scheduler::cadence::Cadence;
use crate::store::Dao;

/// How far past a due fire time a profile's schedule may be before the
/// reconcile loop gives up on it instead of triggering a late run.
const MISFIRE_GRACE: ChronoDuration = ChronoDuration::hours(1);

/// Wraps the persistence layer and the orchestrator to drive every enabled
/// profile's cadence.
#[derive(Clone)]
pub struct Scheduler {
    dao: Arc<dyn Dao>,
    orchestrator: Arc<PipelineOrchestrator>,
    job_retention_days: i64,
}

impl Scheduler {
    #[must_use]
    pub fn new(dao: Arc<dyn Dao>, orchestrator: Arc<PipelineOrchestrator>, job_retention_days: i64) -> Self {
        Self { dao, orchestrator, job_retention_days }
    }

    /// Checks every enabled profile's cadence and triggers the ones that are
    /// due, coalescing any runs missed while the daemon was down into a
    /// single fire rather than replaying each one.
    ///
    /// # Errors
    /// Returns an error when listing profiles fails.
    pub async fn reconcile(&self) -> Result<u64> {
        let now = Utc::now();
        let mut triggered = 0u64;

        for mut profile in self.dao.list_enabled_profiles().await? {
            let schedule = profile.schedule.clone();
            let cadence = match Cadence::new(&schedule.timezone, u32::from(schedule.hour), u32::from(schedule.minute), &schedule.weekdays)
            {
                Ok(cadence) => cadence,
                Err(error) => {
                    warn!(profile_id = %profile.id, error = %error, "invalid schedule, skipping profile");
                    continue;
                }
            };

            let baseline = schedule.last_run.map_or(now, |last_run| last_run + ChronoDuration::seconds(1));
            let next = cadence.next_run_from(baseline);
            if next > now {
                continue;
            }

            profile.schedule.last_run = Some(next);
            let overdue = now - next;
            if overdue > MISFIRE_GRACE {
                warn!(profile_id = %profile.id, overdue_seconds = overdue.num_seconds(), "missed schedule beyond grace, skipping this fire");
                self.dao.update_profile(&profile).await?;
                continue;
            }

            match self.orchestrator.start(profile.id, JobOptions::default()).await {
                Ok(job_id) => {
                    info!(profile_id = %profile.id, %job_id, "triggered scheduled job");
                    triggered += 1;
                }
                Err(error) => warn!(profile_id = %profile.id, error = %error, "failed to trigger scheduled job"),
            }
            self.dao.update_profile(&profile).await?;
        }

        Ok(triggered)
    }

    /// # Errors
    /// Returns an error when the Dao deletion fails.
    pub async fn cleanup_old_jobs(&self) -> Result<u64> {
        self.dao.delete_old_jobs(self.job_retention_days).await
    }
}
