//! Resolves batches of user-supplied YouTube channel identifiers to
//! canonical channel IDs via the YouTube Data API v3, distributing work
//! over a pool of background workers while multiplexing a small pool of
//! API credentials across tenants and bounding per-tenant request rates.
//!
//! The external collaborators named in the system design -- the task
//! queue, persistence, the shared counter/lock service, HTTP transport --
//! are all behind traits ([`state::StateStore`], [`counters::CounterService`],
//! [`queue::WorkQueue`], [`youtube::Transport`]); this crate ships
//! in-memory/in-process reference implementations of each, suitable for
//! tests and the demo binary, but not for production durability.

pub mod clock;
pub mod config;
pub mod counters;
pub mod error;
pub mod finalizer;
pub mod keys;
pub mod limiter;
pub mod model;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod retry;
pub mod state;
pub mod worker;
pub mod youtube;

pub use clock::Clock;
pub use clock::SystemClock;
pub use config::Config;
pub use error::CollectorError;
pub use finalizer::Finalizer;
pub use keys::ApiKey;
pub use keys::KeyRotator;
pub use limiter::RateLimiter;
pub use model::Job;
pub use model::JobStatus;
pub use model::Run;
pub use model::RunStatus;
pub use model::Summary;
pub use orchestrator::Orchestrator;
pub use queue::InProcessQueue;
pub use queue::WorkQueue;
pub use retry::Pipeline;
pub use state::InMemoryState;
pub use state::StateStore;
pub use worker::JobWorker;
pub use youtube::HttpTransport;
pub use youtube::Transport;
pub use youtube::YouTubeClient;
