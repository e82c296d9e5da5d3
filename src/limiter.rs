//! Per-tenant sliding-window rate limiter.
//!
//! `throttle` blocks the caller until at most `max_requests` operations
//! have been observed against `tenant_id` in the trailing `period`. The
//! trim-check-insert step is one atomic call against the counter service
//! (`CounterService::try_reserve`), so two concurrent callers for the same
//! tenant can never both observe room and both get admitted; the sleep
//! that follows when the window is full is not atomic, and is
//! cancellation-safe (a dropped future never leaves a spurious insertion
//! behind).

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::instrument;

use crate::clock::Clock;
use crate::counters::CounterService;
use crate::error::RateLimitError;

/// Default window: 5 requests per 1 second, matching the spec's default.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

pub struct RateLimiter {
    counters: Arc<dyn CounterService>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterService>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }

    /// Blocks until a slot within `max_requests` per `period` is available
    /// for `tenant_id`, then reserves it.
    #[instrument(skip(self), fields(tenant_id))]
    pub async fn throttle(
        &self,
        tenant_id: &str,
        max_requests: u32,
        period: Duration,
    ) -> Result<(), RateLimitError> {
        let key = format!("throttle:{tenant_id}");
        loop {
            let current_score = self.clock.monotonic_seconds();
            let window_start = current_score - period.as_secs_f64();

            if self
                .counters
                .try_reserve(&key, window_start, current_score, max_requests as u64)
                .await
            {
                return Ok(());
            }

            let oldest = self.counters.zmin(&key).await.unwrap_or(current_score);
            let wait_until_score = oldest + period.as_secs_f64();
            let wait = (wait_until_score - current_score).max(0.0);
            debug!(tenant_id, wait_seconds = wait, "rate limit window full, sleeping");

            if wait > 0.0 {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs_f64(wait)) => {}
                }
            }
            // Loop back around: re-check the window rather than blindly
            // inserting, since another caller may have taken the slot
            // while we slept.
        }
    }
}
