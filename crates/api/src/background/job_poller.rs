//! Periodic RunPod status polling for active jobs.
//!
//! Every `JOB_POLL_INTERVAL_SECS` the poller loads queued and processing
//! jobs that have a RunPod id and applies their current status via
//! [`job_sync::sync_job`]. Failures are logged per job; the loop never
//! retries within a tick.

use std::time::Duration;

use engui_db::repositories::JobRepo;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::background::job_sync;
use crate::state::AppState;

/// Maximum jobs checked per tick.
const BATCH_SIZE: i64 = 50;

/// Run the job polling loop until `cancel` is triggered.
pub async fn run(state: AppState, cancel: CancellationToken) {
    let interval_secs = state.config.job_poll_interval_secs;
    tracing::info!(interval_secs, "Job poller started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job poller stopping");
                break;
            }
            _ = interval.tick() => {
                poll_once(&state).await;
            }
        }
    }
}

/// Check every active job once. Returns the number of jobs checked.
pub async fn poll_once(state: &AppState) -> usize {
    let jobs = match JobRepo::list_active(&state.pool, BATCH_SIZE).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!(error = %e, "Job poller: failed to load active jobs");
            return 0;
        }
    };
    if jobs.is_empty() {
        return 0;
    }

    tracing::debug!(count = jobs.len(), "Job poller: checking active jobs");
    for job in &jobs {
        if let Err(e) = job_sync::sync_job(state, job).await {
            tracing::warn!(job_id = job.id, error = %e, "Job poller: status check failed");
        }
    }
    jobs.len()
}
