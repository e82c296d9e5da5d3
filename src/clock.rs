//! Monotonic-clock abstraction used by the rate limiter and the key
//! rotator's cooldown arithmetic. Business logic never calls
//! `Instant::now()` directly so tests can drive time deterministically.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use time::OffsetDateTime;

/// A source of monotonic instants (for rate limiting / cooldown) and wall
/// clock timestamps (for `Run`/`Job` `*_at` fields).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn now_utc(&self) -> OffsetDateTime;

    /// Seconds since some fixed, process-local epoch. Monotonically
    /// increasing; only meaningful relative to other calls against the
    /// same `Clock`. Used as the score for sliding-window rate-limit
    /// entries, mirroring `time.time()` timestamps in the reference
    /// implementation without depending on wall-clock jumps.
    fn monotonic_seconds(&self) -> f64;
}

static SYSTEM_EPOCH: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);

/// The real clock, backed by `std::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn monotonic_seconds(&self) -> f64 {
        Instant::now().duration_since(*SYSTEM_EPOCH).as_secs_f64()
    }
}

/// A controllable clock for tests: `now()`/`now_utc()` only advance when
/// `advance()` is called.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

struct FakeClockState {
    instant: Instant,
    utc: OffsetDateTime,
    seconds: f64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                instant: Instant::now(),
                utc: OffsetDateTime::now_utc(),
                seconds: 0.0,
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.instant += duration;
        state.utc += duration;
        state.seconds += duration.as_secs_f64();
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().unwrap().instant
    }

    fn now_utc(&self) -> OffsetDateTime {
        self.inner.lock().unwrap().utc
    }

    fn monotonic_seconds(&self) -> f64 {
        self.inner.lock().unwrap().seconds
    }
}
