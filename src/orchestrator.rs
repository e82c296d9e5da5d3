//! Entry point for starting a Run: normalizes the submitted inputs, creates
//! the Run and its Jobs, and enqueues the Jobs for the worker pool.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing::instrument;

use crate::clock::Clock;
use crate::error::OrchestratorError;
use crate::finalizer::Finalizer;
use crate::model::Job;
use crate::model::JobStatus;
use crate::model::Run;
use crate::model::RunStatus;
use crate::model::Summary;
use crate::queue::WorkQueue;
use crate::state::StateStore;

pub struct Orchestrator {
    state: Arc<dyn StateStore>,
    queue: Arc<dyn WorkQueue>,
    clock: Arc<dyn Clock>,
    finalizer: Arc<Finalizer>,
}

/// Result of starting a Run.
#[derive(Debug, Clone, Serialize)]
pub struct StartRunResult {
    pub run_id: u64,
    pub total_jobs: u64,
}

/// The shape returned by `get_run_status`, matching the status surface in
/// SPEC_FULL.md §6.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusView {
    pub run_id: u64,
    pub run_status: RunStatus,
    pub progress: f64,
    pub total_jobs: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub failed_jobs: Vec<FailedJobView>,
    pub summary: Option<Summary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedJobView {
    pub job_id: u64,
    pub input_channel: String,
    pub last_error: Option<String>,
}

impl Orchestrator {
    pub fn new(state: Arc<dyn StateStore>, queue: Arc<dyn WorkQueue>, clock: Arc<dyn Clock>, finalizer: Arc<Finalizer>) -> Self {
        Self {
            state,
            queue,
            clock,
            finalizer,
        }
    }

    /// Normalizes `inputs` (trim, discard empty, dedupe preserving sorted
    /// order), creates the Run and one Job per surviving input, and
    /// enqueues each Job. A Run with zero surviving inputs is finalized
    /// synchronously with an empty summary.
    #[instrument(skip(self, inputs))]
    pub async fn start_run(&self, analysis_id: u64, owner_id: &str, inputs: &[String]) -> Result<StartRunResult, OrchestratorError> {
        let normalized: BTreeSet<String> = inputs
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let run_id = self.state.next_run_id();
        let now = self.clock.now_utc();
        let run = Run::new(run_id, analysis_id, owner_id.to_string(), now);
        self.state.create_run(run)?;

        if normalized.is_empty() {
            info!(run_id, "run has no inputs, finalizing synchronously");
            self.state.update_run(run_id, &mut |r| {
                r.status = RunStatus::Finished;
                r.finished_at = Some(now);
                r.summary = Some(Summary {
                    total: 0,
                    done: 0,
                    failed: 0,
                    needs_search: 0,
                    duration_seconds: 0.0,
                });
            })?;
            return Ok(StartRunResult { run_id, total_jobs: 0 });
        }

        let total_jobs = normalized.len() as u64;
        for input in normalized {
            let job_id = self.state.next_job_id();
            let job = Job::new(job_id, run_id, input, now);
            self.state.create_job(job)?;
            self.queue.enqueue_job(job_id, run_id);
        }

        info!(run_id, total_jobs, "run started");
        Ok(StartRunResult { run_id, total_jobs })
    }

    /// Attempts to finalize `run_id` if every Job has reached a terminal
    /// state. Exposed so callers with external knowledge that a Run may be
    /// ready (e.g. a finalizer work item) don't need their own `Finalizer`.
    pub async fn try_finalize(&self, run_id: u64) -> Result<bool, crate::error::FinalizerError> {
        self.finalizer.try_finalize(run_id).await
    }

    pub fn get_run_status(&self, run_id: u64) -> Option<RunStatusView> {
        let run = self.state.get_run(run_id)?;
        let jobs = self.state.jobs_for_run(run_id);
        let total_jobs = jobs.len() as u64;

        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut terminal = 0u64;
        let mut failed_jobs = Vec::new();
        for job in &jobs {
            *status_counts.entry(status_label(job.status).to_string()).or_insert(0) += 1;
            if job.status.is_terminal() {
                terminal += 1;
            }
            if job.status == JobStatus::Failed {
                failed_jobs.push(FailedJobView {
                    job_id: job.id,
                    input_channel: job.input_channel.clone(),
                    last_error: job.last_error.clone(),
                });
            }
        }

        let progress = if total_jobs == 0 { 1.0 } else { terminal as f64 / total_jobs as f64 };

        Some(RunStatusView {
            run_id,
            run_status: run.status,
            progress,
            total_jobs,
            status_counts,
            failed_jobs,
            summary: run.summary,
        })
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Processing => "PROCESSING",
        JobStatus::Done => "DONE",
        JobStatus::Failed => "FAILED",
        JobStatus::NeedsSearch => "NEEDS_SEARCH",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::counters::InMemoryCounterService;
    use crate::queue::InProcessQueue;
    use crate::queue::WorkItem;
    use crate::state::InMemoryState;

    fn orchestrator() -> (Orchestrator, Arc<InMemoryState>, tokio::sync::mpsc::UnboundedReceiver<WorkItem>) {
        let state = Arc::new(InMemoryState::new());
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new());
        let (queue, rx) = InProcessQueue::new();
        let counters = Arc::new(InMemoryCounterService::new());
        let finalizer = Arc::new(Finalizer::new(state.clone(), counters, clock.clone()));
        let orchestrator = Orchestrator::new(state.clone(), Arc::new(queue), clock, finalizer);
        (orchestrator, state, rx)
    }

    #[tokio::test]
    async fn normalizes_trims_and_dedupes_preserving_sorted_order() {
        let (orchestrator, state, mut rx) = orchestrator();
        let inputs = vec![
            "  channelB ".to_string(),
            "channelA".to_string(),
            "channelB".to_string(),
            "".to_string(),
            "   ".to_string(),
        ];

        let result = orchestrator.start_run(1, "tenant-a", &inputs).await.unwrap();
        assert_eq!(result.total_jobs, 2);

        let jobs = state.jobs_for_run(result.run_id);
        let mut seen_inputs: Vec<_> = jobs.iter().map(|j| j.input_channel.clone()).collect();
        seen_inputs.sort();
        assert_eq!(seen_inputs, vec!["channelA".to_string(), "channelB".to_string()]);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, WorkItem::ProcessJob { .. }));
        assert!(matches!(second, WorkItem::ProcessJob { .. }));
    }

    #[tokio::test]
    async fn zero_jobs_finalizes_synchronously() {
        let (orchestrator, state, mut rx) = orchestrator();
        let inputs = vec!["   ".to_string(), "".to_string()];

        let result = orchestrator.start_run(1, "tenant-a", &inputs).await.unwrap();
        assert_eq!(result.total_jobs, 0);

        let run = state.get_run(result.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Finished);
        assert_eq!(run.summary.unwrap().total, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_status_reports_progress_and_failed_jobs() {
        let (orchestrator, state, _rx) = orchestrator();
        let result = orchestrator
            .start_run(1, "tenant-a", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        let jobs = state.jobs_for_run(result.run_id);
        state
            .update_job(jobs[0].id, &mut |j| j.status = JobStatus::Done)
            .unwrap();
        state
            .update_job(jobs[1].id, &mut |j| {
                j.status = JobStatus::Failed;
                j.last_error = Some("boom".to_string());
            })
            .unwrap();

        let view = orchestrator.get_run_status(result.run_id).unwrap();
        assert_eq!(view.total_jobs, 2);
        assert_eq!(view.progress, 1.0);
        assert_eq!(view.failed_jobs.len(), 1);
        assert_eq!(view.failed_jobs[0].last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unknown_run_status_is_none() {
        let (orchestrator, _state, _rx) = orchestrator();
        assert!(orchestrator.get_run_status(999).is_none());
    }
}
