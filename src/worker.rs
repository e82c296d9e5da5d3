//! Drains the work queue for a single Job: runs it through the resolver,
//! persists the outcome, and schedules the finalizer. Mirrors the
//! Celery task body in `tasks.py`, minus the framework retry/ack machinery
//! (handled upstream by the `WorkQueue`'s at-least-once contract instead).

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use tracing::warn;

use crate::clock::Clock;
use crate::model::JobStatus;
use crate::queue::WorkQueue;
use crate::resolver;
use crate::resolver::ResolveOutcome;
use crate::state::StateStore;
use crate::youtube::Transport;
use crate::youtube::YouTubeClient;

/// Soft time limit on one Job's resolver call, matching
/// `SoftTimeLimitExceeded` handling in the reference Celery task.
pub const DEFAULT_SOFT_TTL: Duration = Duration::from_secs(60);

pub struct JobWorker<T: Transport> {
    state: Arc<dyn StateStore>,
    client: Arc<YouTubeClient<T>>,
    queue: Arc<dyn WorkQueue>,
    clock: Arc<dyn Clock>,
    soft_ttl: Duration,
}

impl<T: Transport> JobWorker<T> {
    pub fn new(
        state: Arc<dyn StateStore>,
        client: Arc<YouTubeClient<T>>,
        queue: Arc<dyn WorkQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            client,
            queue,
            clock,
            soft_ttl: DEFAULT_SOFT_TTL,
        }
    }

    pub fn with_soft_ttl(mut self, soft_ttl: Duration) -> Self {
        self.soft_ttl = soft_ttl;
        self
    }

    /// Processes one Job. Idempotent: a Job already in a terminal state is
    /// left untouched (the at-least-once queue may redeliver it).
    #[instrument(skip(self))]
    pub async fn process(&self, job_id: u64, run_id: u64) {
        let Some(job) = self.state.get_job(job_id) else {
            warn!(job_id, "worker received unknown job, dropping");
            return;
        };

        if job.status.is_terminal() {
            return;
        }

        let marked = self.state.update_job(job_id, &mut |j| {
            j.status = JobStatus::Processing;
            j.attempts += 1;
            j.updated_at = self.clock.now_utc();
        });
        if marked.is_err() {
            warn!(job_id, "failed to mark job processing, dropping");
            return;
        }

        let Some(run) = self.state.get_run(run_id) else {
            warn!(run_id, job_id, "worker received job for unknown run, dropping");
            return;
        };

        let outcome = tokio::time::timeout(
            self.soft_ttl,
            resolver::resolve(&job.input_channel, &run.owner_id, &self.client),
        )
        .await;

        let (status, channel_id, error) = match outcome {
            Ok(Ok(ResolveOutcome::Resolved { channel_id, .. })) => (JobStatus::Done, Some(channel_id), None),
            Ok(Ok(ResolveOutcome::NeedsSearchFallback { reason })) => (JobStatus::NeedsSearch, None, Some(reason)),
            Ok(Ok(ResolveOutcome::Failed { reason })) => (JobStatus::Failed, None, Some(reason)),
            Ok(Err(err)) => (JobStatus::Failed, None, Some(err.to_string())),
            Err(_elapsed) => (JobStatus::Failed, None, Some("soft TTL exceeded".to_string())),
        };

        let _ = self.state.update_job(job_id, &mut |j| {
            j.status = status;
            j.youtube_channel_id = channel_id.clone();
            j.last_error = error.clone();
            j.updated_at = self.clock.now_utc();
        });

        self.queue.enqueue_finalize(run_id);
    }
}
