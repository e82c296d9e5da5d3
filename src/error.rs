//! Crate-wide error taxonomy.
//!
//! Every subsystem raises its own narrow error type; this module stitches
//! them into the kinds from the spec (QUOTA, TRANSIENT, FATAL_CLIENT,
//! NO_KEYS, RETRIES_EXHAUSTED, CANCELLED, CONFIG) so a worker can match on
//! a single enum when deciding how to terminate a Job.

use thiserror::Error;

/// Error raised by the state store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("entity {0} not found")]
    NotFound(String),
    #[error("entity {0} already exists")]
    Conflict(String),
}

/// Error raised while acquiring or cooling down an API key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("no API keys available")]
    NoKeysAvailable,
}

/// Error raised by the per-tenant rate limiter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("throttle wait was cancelled")]
    Cancelled,
}

/// Classification of a single API call outcome, produced by the API client
/// facade and consumed by the retry pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("quota exceeded")]
    Quota,
    #[error("transient error: {0}")]
    Transient(String),
    #[error("fatal client error: {0}")]
    FatalClient(String),
}

/// Error surfaced by the retry/execute pipeline to its caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("fatal client error: {0}")]
    FatalClient(String),
    #[error("no API keys available")]
    NoKeys,
    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// Error surfaced by the orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error(transparent)]
    State(#[from] StateError),
}

/// Error surfaced by the finalizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FinalizerError {
    #[error(transparent)]
    State(#[from] StateError),
}

/// Fatal startup configuration error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),
}

/// Root error type, used where a caller needs to hold any subsystem error
/// behind one type (the worker's catch-all boundary).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
