//! The `Run`/`Job` data model shared by the orchestrator, worker and
//! finalizer. See SPEC_FULL.md §3 for the invariants these types uphold.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// Status of a `Run`. Transitions only PENDING -> RUNNING -> FINISHED;
/// FINISHED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Finished,
}

/// Status of a `Job`. Forms a DAG: Pending -> Processing -> {Done, Failed,
/// NeedsSearch}; terminal states never transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
    NeedsSearch,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::NeedsSearch)
    }
}

/// One submitted batch of channel inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: u64,
    pub analysis_id: u64,
    pub owner_id: String,
    pub status: RunStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    pub summary: Option<Summary>,
}

/// One input channel within a `Run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub run_id: u64,
    pub input_channel: String,
    pub youtube_channel_id: Option<String>,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The terminal accounting for a finished `Run`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: u64,
    pub done: u64,
    pub failed: u64,
    pub needs_search: u64,
    pub duration_seconds: f64,
}

impl Run {
    pub fn new(id: u64, analysis_id: u64, owner_id: String, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            analysis_id,
            owner_id,
            status: RunStatus::Running,
            created_at,
            finished_at: None,
            summary: None,
        }
    }
}

impl Job {
    pub fn new(id: u64, run_id: u64, input_channel: String, now: OffsetDateTime) -> Self {
        Self {
            id,
            run_id,
            input_channel,
            youtube_channel_id: None,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
