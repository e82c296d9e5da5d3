//! Converges a Run to FINISHED once every Job it owns has reached a
//! terminal state. Guarded by a named advisory lock so concurrent
//! finalize attempts for the same Run (one per completing Job) don't race
//! on the summary computation.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing::instrument;

use crate::clock::Clock;
use crate::counters::CounterService;
use crate::error::FinalizerError;
use crate::model::JobStatus;
use crate::model::RunStatus;
use crate::model::Summary;
use crate::state::StateStore;

/// TTL on the `finalize_run_lock:{run_id}` advisory lock.
pub const LOCK_TTL: Duration = Duration::from_secs(60);

/// Rounds to 2 decimal places, matching `round(duration, 2)` in the
/// reference implementation's summary computation.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub struct Finalizer {
    state: Arc<dyn StateStore>,
    counters: Arc<dyn CounterService>,
    clock: Arc<dyn Clock>,
}

impl Finalizer {
    pub fn new(state: Arc<dyn StateStore>, counters: Arc<dyn CounterService>, clock: Arc<dyn Clock>) -> Self {
        Self { state, counters, clock }
    }

    /// Attempts to finalize `run_id`. Returns `Ok(true)` if this call
    /// actually transitioned the Run to FINISHED, `Ok(false)` if it was
    /// already finished, still has non-terminal Jobs, or lost the race for
    /// the lock to another concurrent attempt.
    #[instrument(skip(self))]
    pub async fn try_finalize(&self, run_id: u64) -> Result<bool, FinalizerError> {
        let run = self
            .state
            .get_run(run_id)
            .ok_or_else(|| crate::error::StateError::NotFound(format!("run {run_id}")))?;

        if run.status == RunStatus::Finished {
            return Ok(false);
        }

        let lock_name = format!("finalize_run_lock:{run_id}");
        if !self.counters.try_lock(&lock_name, LOCK_TTL).await {
            return Ok(false);
        }

        let result = self.finalize_locked(run_id).await;
        self.counters.unlock(&lock_name).await;
        result
    }

    async fn finalize_locked(&self, run_id: u64) -> Result<bool, FinalizerError> {
        // Re-read: another attempt may have finished the run between the
        // initial check and acquiring the lock.
        let run = self
            .state
            .get_run(run_id)
            .ok_or_else(|| crate::error::StateError::NotFound(format!("run {run_id}")))?;
        if run.status == RunStatus::Finished {
            return Ok(false);
        }

        let jobs = self.state.jobs_for_run(run_id);
        if jobs.iter().any(|j| !j.status.is_terminal()) {
            return Ok(false);
        }

        let total = jobs.len() as u64;
        let done = jobs.iter().filter(|j| j.status == JobStatus::Done).count() as u64;
        let failed = jobs.iter().filter(|j| j.status == JobStatus::Failed).count() as u64;
        let needs_search = jobs.iter().filter(|j| j.status == JobStatus::NeedsSearch).count() as u64;

        let now = self.clock.now_utc();
        let duration_seconds = round2((now - run.created_at).as_seconds_f64());
        let summary = Summary {
            total,
            done,
            failed,
            needs_search,
            duration_seconds,
        };

        self.state.update_run(run_id, &mut |r| {
            r.status = RunStatus::Finished;
            r.finished_at = Some(now);
            r.summary = Some(summary);
        })?;

        info!(run_id, total, done, failed, needs_search, "run finalized");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::counters::InMemoryCounterService;
    use crate::model::Job;
    use crate::model::Run;
    use crate::state::InMemoryState;
    use std::time::Duration as StdDuration;

    fn setup() -> (Arc<InMemoryState>, Arc<InMemoryCounterService>, Arc<FakeClock>, Finalizer) {
        let state = Arc::new(InMemoryState::new());
        let counters = Arc::new(InMemoryCounterService::new());
        let clock = Arc::new(FakeClock::new());
        let finalizer = Finalizer::new(state.clone(), counters.clone(), clock.clone());
        (state, counters, clock, finalizer)
    }

    #[tokio::test]
    async fn waits_until_all_jobs_are_terminal() {
        let (state, _counters, clock, finalizer) = setup();
        let run = Run::new(1, 10, "tenant".into(), clock.now_utc());
        state.create_run(run).unwrap();
        state.create_job(Job::new(1, 1, "a".into(), clock.now_utc())).unwrap();
        state
            .update_job(1, &mut |j| j.status = JobStatus::Pending)
            .unwrap();

        let finalized = finalizer.try_finalize(1).await.unwrap();
        assert!(!finalized);
        assert_eq!(state.get_run(1).unwrap().status, RunStatus::Running);
    }

    #[tokio::test]
    async fn finalizes_once_all_jobs_terminal_with_accurate_summary() {
        let (state, _counters, clock, finalizer) = setup();
        let run = Run::new(1, 10, "tenant".into(), clock.now_utc());
        state.create_run(run).unwrap();
        state.create_job(Job::new(1, 1, "a".into(), clock.now_utc())).unwrap();
        state.create_job(Job::new(2, 1, "b".into(), clock.now_utc())).unwrap();
        state.update_job(1, &mut |j| j.status = JobStatus::Done).unwrap();
        state.update_job(2, &mut |j| j.status = JobStatus::Failed).unwrap();

        clock.advance(StdDuration::from_secs(5));
        let finalized = finalizer.try_finalize(1).await.unwrap();
        assert!(finalized);

        let run = state.get_run(1).unwrap();
        assert_eq!(run.status, RunStatus::Finished);
        let summary = run.summary.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.done, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.duration_seconds, 5.0);
    }

    #[tokio::test]
    async fn duration_seconds_is_rounded_to_two_decimal_places() {
        let (state, _counters, clock, finalizer) = setup();
        let run = Run::new(1, 10, "tenant".into(), clock.now_utc());
        state.create_run(run).unwrap();
        state.create_job(Job::new(1, 1, "a".into(), clock.now_utc())).unwrap();
        state.update_job(1, &mut |j| j.status = JobStatus::Done).unwrap();

        clock.advance(StdDuration::from_millis(1234));
        let finalized = finalizer.try_finalize(1).await.unwrap();
        assert!(finalized);

        let run = state.get_run(1).unwrap();
        let summary = run.summary.unwrap();
        assert_eq!(summary.duration_seconds, 1.23);
    }

    #[tokio::test]
    async fn already_finished_run_is_a_noop() {
        let (state, _counters, clock, finalizer) = setup();
        let run = Run::new(1, 10, "tenant".into(), clock.now_utc());
        state.create_run(run).unwrap();
        state
            .update_run(1, &mut |r| {
                r.status = RunStatus::Finished;
                r.finished_at = Some(clock.now_utc());
                r.summary = Some(Summary {
                    total: 0,
                    done: 0,
                    failed: 0,
                    needs_search: 0,
                    duration_seconds: 0.0,
                });
            })
            .unwrap();

        let finalized = finalizer.try_finalize(1).await.unwrap();
        assert!(!finalized);
    }

    #[tokio::test]
    async fn missing_run_errors() {
        let (_state, _counters, _clock, finalizer) = setup();
        let err = finalizer.try_finalize(999).await.unwrap_err();
        assert!(matches!(err, FinalizerError::State(_)));
    }
}
