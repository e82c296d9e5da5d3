//! The state store: mapping from Run ID -> Run and Job ID -> Job.
//!
//! The reference implementation is in-memory and thread-safe; a durable
//! implementation (backed by a real database) can replace it without
//! touching callers, since everything goes through the `StateStore` trait.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

use crate::error::StateError;
use crate::model::Job;
use crate::model::Run;
use crate::model::RunStatus;

/// Linearizable per-entity storage for Runs and Jobs.
///
/// `update_run`/`update_job` take a mutator closure rather than a
/// load-then-store pair: the mutation happens while the entity's single
/// map slot is locked, so callers never need to separately serialize
/// writes to the same id.
pub trait StateStore: Send + Sync {
    fn next_run_id(&self) -> u64;
    fn next_job_id(&self) -> u64;

    fn create_run(&self, run: Run) -> Result<(), StateError>;
    fn get_run(&self, run_id: u64) -> Option<Run>;
    fn update_run(&self, run_id: u64, f: &mut dyn FnMut(&mut Run)) -> Result<(), StateError>;

    fn create_job(&self, job: Job) -> Result<(), StateError>;
    fn get_job(&self, job_id: u64) -> Option<Job>;
    fn update_job(&self, job_id: u64, f: &mut dyn FnMut(&mut Job)) -> Result<(), StateError>;

    fn jobs_for_run(&self, run_id: u64) -> Vec<Job>;

    /// Resets all state. Used by tests to isolate each test's run.
    fn clear_all(&self);
}

/// In-memory `StateStore`, backed by `DashMap` for per-entity concurrency
/// and `AtomicU64` monotonic id counters.
pub struct InMemoryState {
    runs: DashMap<u64, Run>,
    jobs: DashMap<u64, Job>,
    jobs_by_run: DashMap<u64, Vec<u64>>,
    next_run_id: AtomicU64,
    next_job_id: AtomicU64,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
            jobs: DashMap::new(),
            jobs_by_run: DashMap::new(),
            next_run_id: AtomicU64::new(1),
            next_job_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryState {
    fn next_run_id(&self) -> u64 {
        self.next_run_id.fetch_add(1, Ordering::SeqCst)
    }

    fn next_job_id(&self) -> u64 {
        self.next_job_id.fetch_add(1, Ordering::SeqCst)
    }

    fn create_run(&self, run: Run) -> Result<(), StateError> {
        if self.runs.contains_key(&run.id) {
            return Err(StateError::Conflict(format!("run {}", run.id)));
        }
        self.runs.insert(run.id, run);
        Ok(())
    }

    fn get_run(&self, run_id: u64) -> Option<Run> {
        self.runs.get(&run_id).map(|r| r.clone())
    }

    fn update_run(&self, run_id: u64, f: &mut dyn FnMut(&mut Run)) -> Result<(), StateError> {
        let mut entry = self
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| StateError::NotFound(format!("run {run_id}")))?;
        debug_assert!(
            entry.status != RunStatus::Finished,
            "run {run_id} mutated after reaching FINISHED"
        );
        f(&mut entry);
        Ok(())
    }

    fn create_job(&self, job: Job) -> Result<(), StateError> {
        if self.jobs.contains_key(&job.id) {
            return Err(StateError::Conflict(format!("job {}", job.id)));
        }
        let run_id = job.run_id;
        let job_id = job.id;
        self.jobs.insert(job_id, job);
        self.jobs_by_run.entry(run_id).or_default().push(job_id);
        Ok(())
    }

    fn get_job(&self, job_id: u64) -> Option<Job> {
        self.jobs.get(&job_id).map(|j| j.clone())
    }

    fn update_job(&self, job_id: u64, f: &mut dyn FnMut(&mut Job)) -> Result<(), StateError> {
        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StateError::NotFound(format!("job {job_id}")))?;
        f(&mut entry);
        Ok(())
    }

    fn jobs_for_run(&self, run_id: u64) -> Vec<Job> {
        let Some(ids) = self.jobs_by_run.get(&run_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.jobs.get(id).map(|j| j.clone()))
            .collect()
    }

    fn clear_all(&self) {
        self.runs.clear();
        self.jobs.clear();
        self.jobs_by_run.clear();
        self.next_run_id.store(1, Ordering::SeqCst);
        self.next_job_id.store(1, Ordering::SeqCst);
    }
}
