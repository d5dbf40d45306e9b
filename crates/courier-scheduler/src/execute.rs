use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use courier_core::types::{DispatchSummary, JobStatus, ScheduledJob};
use courier_dispatch::DispatchEngine;
use courier_media::MediaStaging;
use courier_store::JobStore;

use crate::error::{Result, SchedulerError};

/// Runs one job to its terminal state: load media, dispatch, persist the
/// outcome exactly once, reclaim staging.
///
/// Shared between the scheduler loop and the gateway's immediate/`execute_now`
/// paths so all three agree on the terminal-transition rules.
pub struct JobExecutor {
    store: Arc<JobStore>,
    dispatch: DispatchEngine,
    media: MediaStaging,
}

impl JobExecutor {
    pub fn new(store: Arc<JobStore>, dispatch: DispatchEngine, media: MediaStaging) -> Self {
        Self {
            store,
            dispatch,
            media,
        }
    }

    /// Execute job `id` now.
    ///
    /// Re-reads the row first: a job deleted or finalized since the caller
    /// last looked is reported, not dispatched — this narrows (without fully
    /// closing) the delete/dispatch race window.
    pub async fn execute(&self, id: i64) -> Result<DispatchSummary> {
        let job = self
            .store
            .get(id)?
            .ok_or(SchedulerError::JobNotFound { id })?;
        if job.status.is_terminal() {
            return Err(SchedulerError::AlreadyProcessed { id });
        }
        self.execute_job(&job).await
    }

    /// Execute a job already fetched as `pending`.
    pub async fn execute_job(&self, job: &ScheduledJob) -> Result<DispatchSummary> {
        let media = match self.media.load(&job.media_refs) {
            Ok(media) => media,
            Err(e) => {
                // Attachments are gone or unreadable — the job cannot ever
                // succeed, so finalize as failed instead of retrying forever.
                warn!(job_id = job.id, error = %e, "staged media unreadable, failing job");
                self.finalize(job, JobStatus::Failed);
                return Err(e.into());
            }
        };

        info!(
            job_id = job.id,
            owner = %job.owner,
            recipients = job.recipients.len(),
            media = media.len(),
            "executing job"
        );
        let summary = self
            .dispatch
            .send(&job.owner, &job.body, &job.recipients, &media)
            .await;

        self.finalize(job, summary.job_status());
        Ok(summary)
    }

    /// Mark a pending job failed without attempting dispatch (unparseable
    /// timestamp, broken staging commit).
    pub fn fail_without_dispatch(&self, job: &ScheduledJob, reason: &str) {
        warn!(job_id = job.id, reason, "failing job without dispatch");
        self.finalize(job, JobStatus::Failed);
    }

    /// Persist the terminal transition (at most once) and reclaim staging.
    fn finalize(&self, job: &ScheduledJob, status: JobStatus) {
        let executed_at = Utc::now().to_rfc3339();
        match self.store.mark_terminal(job.id, status, &executed_at) {
            Ok(true) => {
                info!(job_id = job.id, status = %status, "job finalized");
            }
            Ok(false) => {
                // Lost the race against a concurrent finalizer — theirs won.
                warn!(job_id = job.id, "job was already terminal, keeping earlier outcome");
            }
            Err(e) => {
                // Leave the row pending; the next scan retries it.
                warn!(job_id = job.id, error = %e, "failed to persist terminal status");
                return;
            }
        }
        self.media.reclaim(&job.media_refs);
    }
}
