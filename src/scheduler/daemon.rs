use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};

use crate::scheduler::Scheduler;

const POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Runs the retention sweep roughly once an hour at the default poll cadence.
const CLEANUP_EVERY_N_TICKS: u64 = 60;

/// Polls every enabled profile's cadence once per `POLL_INTERVAL` and
/// triggers the ones that are due.
pub fn spawn_scheduler_daemon(scheduler: Scheduler) -> JoinHandle<()> {
    SchedulerDaemon::new(scheduler).spawn()
}

struct SchedulerDaemon {
    scheduler: Scheduler,
}

impl SchedulerDaemon {
    fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut tick: u64 = 0;
        loop {
            sleep(POLL_INTERVAL).await;
            tick += 1;

            match self.scheduler.reconcile().await {
                Ok(0) => {}
                Ok(triggered) => info!(triggered, "scheduler reconcile triggered jobs"),
                Err(error) => error!(error = %error, "scheduler reconcile failed"),
            }

            if tick % CLEANUP_EVERY_N_TICKS == 0 {
                if let Err(error) = self.scheduler.cleanup_old_jobs().await {
                    error!(error = %error, "failed to clean up old jobs");
                }
            }
        }
    }
}
