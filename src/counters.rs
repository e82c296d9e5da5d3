//! The shared counter/lock service: per-tenant sliding-window counters for
//! the rate limiter, and named advisory locks for the finalizer.
//!
//! The reference implementation is in-memory; its shape (sorted-set
//! operations keyed by score, plus a TTL'd named lock) is exactly what a
//! Redis-backed implementation exposes, so swapping one in later is a
//! matter of implementing `CounterService` against a real client rather
//! than restructuring callers.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;

/// Sorted-set and advisory-lock operations used by the rate limiter and
/// the finalizer. All operations are async to allow a networked
/// implementation (e.g. against Redis) to sit behind the same trait.
#[async_trait]
pub trait CounterService: Send + Sync {
    /// Removes entries from `key` with score <= `max_score`.
    async fn zremrangebyscore(&self, key: &str, max_score: f64);

    /// Inserts `member` into `key`'s sorted set, scored by `score`.
    async fn zadd(&self, key: &str, member: f64, score: f64);

    /// Returns the cardinality of `key`'s sorted set.
    async fn zcard(&self, key: &str) -> u64;

    /// Returns the smallest score currently stored in `key`'s sorted set.
    async fn zmin(&self, key: &str) -> Option<f64>;

    /// Atomically drops entries scored <= `max_score`, then returns the
    /// resulting cardinality without inserting anything.
    async fn trim_and_count(&self, key: &str, max_score: f64) -> u64;

    /// Atomically drops entries scored <= `max_score`, then inserts `score`
    /// and returns `true` only if the cardinality *after* trimming was
    /// below `max_requests` -- i.e. trim, check, and insert all happen
    /// under one critical section. This is the primitive `throttle` uses
    /// so two concurrent callers against the same key can never both
    /// observe room and both get admitted.
    async fn try_reserve(&self, key: &str, max_score: f64, score: f64, max_requests: u64) -> bool;

    /// Attempts to acquire a named advisory lock with the given TTL.
    /// Returns `true` if acquired, `false` if already held.
    async fn try_lock(&self, name: &str, ttl: Duration) -> bool;

    /// Releases a previously acquired lock. No-op if not held.
    async fn unlock(&self, name: &str);

    /// Clears all counters and locks. Used by tests.
    async fn clear_all(&self);
}

#[derive(Default)]
struct SortedSet {
    entries: BTreeMap<u64, f64>,
    next_seq: u64,
}

impl SortedSet {
    fn insert(&mut self, score: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(seq, score);
    }

    fn remove_le(&mut self, max_score: f64) {
        self.entries.retain(|_, score| *score > max_score);
    }

    fn min_score(&self) -> Option<f64> {
        self.entries.values().cloned().fold(None, |acc, s| match acc {
            None => Some(s),
            Some(m) if s < m => Some(s),
            Some(m) => Some(m),
        })
    }
}

struct LockEntry {
    expires_at: Instant,
}

/// In-memory `CounterService`. Uses a `std::sync::Mutex` because its
/// critical sections are short, non-blocking arithmetic on plain maps --
/// no `.await` happens while the lock is held.
pub struct InMemoryCounterService {
    sets: Mutex<std::collections::HashMap<String, SortedSet>>,
    locks: Mutex<std::collections::HashMap<String, LockEntry>>,
}

impl InMemoryCounterService {
    pub fn new() -> Self {
        Self {
            sets: Mutex::new(std::collections::HashMap::new()),
            locks: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryCounterService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterService for InMemoryCounterService {
    async fn zremrangebyscore(&self, key: &str, max_score: f64) {
        let mut sets = self.sets.lock().unwrap();
        if let Some(set) = sets.get_mut(key) {
            set.remove_le(max_score);
        }
    }

    async fn zadd(&self, key: &str, _member: f64, score: f64) {
        let mut sets = self.sets.lock().unwrap();
        sets.entry(key.to_string()).or_default().insert(score);
    }

    async fn zcard(&self, key: &str) -> u64 {
        let sets = self.sets.lock().unwrap();
        sets.get(key).map(|s| s.entries.len() as u64).unwrap_or(0)
    }

    async fn zmin(&self, key: &str) -> Option<f64> {
        let sets = self.sets.lock().unwrap();
        sets.get(key).and_then(|s| s.min_score())
    }

    async fn trim_and_count(&self, key: &str, max_score: f64) -> u64 {
        let mut sets = self.sets.lock().unwrap();
        let set = sets.entry(key.to_string()).or_default();
        set.remove_le(max_score);
        set.entries.len() as u64
    }

    async fn try_reserve(&self, key: &str, max_score: f64, score: f64, max_requests: u64) -> bool {
        let mut sets = self.sets.lock().unwrap();
        let set = sets.entry(key.to_string()).or_default();
        set.remove_le(max_score);
        if set.entries.len() as u64 >= max_requests {
            return false;
        }
        set.insert(score);
        true
    }

    async fn try_lock(&self, name: &str, ttl: Duration) -> bool {
        let mut locks = self.locks.lock().unwrap();
        let now = Instant::now();
        if let Some(existing) = locks.get(name) {
            if existing.expires_at > now {
                return false;
            }
        }
        locks.insert(
            name.to_string(),
            LockEntry {
                expires_at: now + ttl,
            },
        );
        true
    }

    async fn unlock(&self, name: &str) {
        let mut locks = self.locks.lock().unwrap();
        locks.remove(name);
    }

    async fn clear_all(&self) {
        self.sets.lock().unwrap().clear();
        self.locks.lock().unwrap().clear();
    }
}
