use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use courier_core::config::SchedulerConfig;
use courier_store::JobStore;

use crate::error::Result;
use crate::execute::JobExecutor;
use crate::normalize::normalize_scheduled_for;

/// Jobs within this many seconds of their scheduled time count as due, so a
/// poll landing just before the minute mark does not slip a whole cycle.
const DUE_GRACE_SECS: i64 = 60;

/// Background loop: polls the store for pending jobs and hands due ones to
/// the [`JobExecutor`].
pub struct SchedulerEngine {
    store: Arc<JobStore>,
    executor: Arc<JobExecutor>,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl SchedulerEngine {
    pub fn new(store: Arc<JobStore>, executor: Arc<JobExecutor>, cfg: &SchedulerConfig) -> Self {
        Self {
            store,
            executor,
            poll_interval: Duration::from_secs(cfg.poll_secs),
            error_backoff: Duration::from_secs(cfg.error_backoff_secs),
        }
    }

    /// Main loop. Polls until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_secs = self.poll_interval.as_secs(),
            "scheduler engine started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan(Utc::now()).await {
                        error!("scheduler scan failed: {e}");
                        interval.reset_after(self.error_backoff);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One poll cycle against `now`. Returns how many jobs were executed.
    ///
    /// Per-job problems (bad timestamp, dispatch failure) finalize or skip
    /// that job and never abort the cycle; only a store-level read error
    /// propagates out.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<usize> {
        let pending = self.store.list_pending()?;
        let mut executed = 0;

        for job in &pending {
            let when = match normalize_scheduled_for(&job.scheduled_for, now) {
                Ok(when) => when,
                Err(e) => {
                    // A timestamp that never parses would stay pending
                    // forever; finalize it instead of rescanning it each
                    // cycle.
                    warn!(job_id = job.id, raw = %job.scheduled_for, error = %e, "unparseable schedule");
                    self.executor.fail_without_dispatch(job, "unparseable schedule");
                    continue;
                }
            };

            if when > now + chrono::Duration::seconds(DUE_GRACE_SECS) {
                continue;
            }

            match self.executor.execute_job(job).await {
                Ok(summary) => {
                    executed += 1;
                    info!(
                        job_id = job.id,
                        sent = summary.sent_count,
                        failed = summary.failed_count,
                        "scheduled job dispatched"
                    );
                }
                Err(e) => {
                    error!(job_id = job.id, error = %e, "scheduled job execution failed");
                }
            }
        }

        Ok(executed)
    }
}
