//! The retry/execute pipeline: wraps a single API invocation with error
//! classification, bounded retries with exponential backoff + jitter,
//! quota-aware key rotation, and per-tenant rate-limit gating.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::error::ApiError;
use crate::error::PipelineError;
use crate::keys::ApiKey;
use crate::keys::KeyRotator;
use crate::keys::DEFAULT_COOLDOWN;
use crate::limiter::RateLimiter;
use crate::limiter::DEFAULT_MAX_REQUESTS;
use crate::limiter::DEFAULT_PERIOD;

/// Attempt budget and backoff schedule, matching spec.md §4.4.
pub const MAX_RETRIES: u32 = 5;
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const BACKOFF_FACTOR: f64 = 2.0;

/// Drives a single API call through throttling, key rotation and bounded
/// retry-with-backoff.
pub struct Pipeline {
    rotator: Arc<KeyRotator>,
    limiter: Arc<RateLimiter>,
    max_requests: u32,
    period: Duration,
    cooldown: Duration,
}

impl Pipeline {
    pub fn new(rotator: Arc<KeyRotator>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            rotator,
            limiter,
            max_requests: DEFAULT_MAX_REQUESTS,
            period: DEFAULT_PERIOD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_throttle(mut self, max_requests: u32, period: Duration) -> Self {
        self.max_requests = max_requests;
        self.period = period;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Executes `request_factory(key)` with up to `MAX_RETRIES` attempts.
    /// `request_factory` is invoked with the key currently held by the
    /// rotator so the caller can build a transport bound to it.
    #[instrument(skip(self, request_factory), fields(tenant_id))]
    pub async fn execute<F, Fut, T>(&self, tenant_id: &str, request_factory: F) -> Result<T, PipelineError>
    where
        F: Fn(ApiKey) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..MAX_RETRIES {
            self.limiter
                .throttle(tenant_id, self.max_requests, self.period)
                .await
                .map_err(|_| PipelineError::Cancelled)?;

            let key = match self.rotator.acquire().await {
                Ok(key) => key,
                Err(_) => return Err(PipelineError::NoKeys),
            };

            match request_factory(key.clone()).await {
                Ok(value) => return Ok(value),
                Err(ApiError::Quota) => {
                    self.rotator.cooldown(&key, self.cooldown).await;
                    last_error = Some(ApiError::Quota);
                    // No sleep, no backoff increment: swapping keys is the
                    // remedy, not waiting.
                    continue;
                }
                Err(ApiError::Transient(msg)) => {
                    let jitter = rand::rng().random_range(0.0..1.0);
                    let sleep_for = backoff + Duration::from_secs_f64(jitter);
                    warn!(
                        attempt,
                        sleep_secs = sleep_for.as_secs_f64(),
                        "transient API error, backing off"
                    );
                    tokio::time::sleep(sleep_for).await;
                    backoff = Duration::from_secs_f64(backoff.as_secs_f64() * BACKOFF_FACTOR);
                    last_error = Some(ApiError::Transient(msg));
                    continue;
                }
                Err(ApiError::FatalClient(msg)) => {
                    return Err(PipelineError::FatalClient(msg));
                }
            }
        }

        info!(tenant_id, "retries exhausted");
        Err(PipelineError::RetriesExhausted(
            last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}
