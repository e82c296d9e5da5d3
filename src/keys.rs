//! The API credential rotator: owns the pool of YouTube Data API keys,
//! hands one out round-robin, and puts keys that hit quota on cooldown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

use crate::clock::Clock;
use crate::error::KeyError;

/// Default cooldown applied to a key after a quota error.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// An opaque API credential. Deliberately doesn't implement `Display` so a
/// stray `{key}` in a log statement doesn't leak the full value; use
/// `Key::redacted` for logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn from_raw(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last 4 characters, for log lines that need to distinguish keys
    /// without printing them in full.
    pub fn redacted(&self) -> String {
        let s = &self.0;
        if s.len() <= 4 {
            "****".to_string()
        } else {
            format!("...{}", &s[s.len() - 4..])
        }
    }
}

struct Cooldown {
    key: ApiKey,
    until: Instant,
}

struct RotatorState {
    live: VecDeque<ApiKey>,
    cooldowns: Vec<Cooldown>,
}

/// Thread-safe, round-robin pool of API keys with cooldown.
///
/// All operations are mutually exclusive via a single `tokio::sync::Mutex`
/// guarding the pool, matching the spec's "all operations are serialized"
/// contract in §4.3.
pub struct KeyRotator {
    original: Vec<ApiKey>,
    state: Mutex<RotatorState>,
    clock: Arc<dyn Clock>,
}

impl KeyRotator {
    pub fn new(keys: Vec<ApiKey>, clock: Arc<dyn Clock>) -> Self {
        let live: VecDeque<ApiKey> = keys.iter().cloned().collect();
        Self {
            original: keys,
            state: Mutex::new(RotatorState {
                live,
                cooldowns: Vec::new(),
            }),
            clock,
        }
    }

    /// Parses a comma-separated `YT_API_KEYS`-style string into a
    /// `KeyRotator`. Each key is trimmed; empty entries are discarded.
    pub fn from_comma_separated(raw: &str, clock: Arc<dyn Clock>) -> Result<Self, crate::error::ConfigError> {
        let keys: Vec<ApiKey> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| ApiKey(Arc::from(s)))
            .collect();
        if keys.is_empty() {
            return Err(crate::error::ConfigError::Invalid(
                "YT_API_KEYS must contain at least one non-empty key".to_string(),
            ));
        }
        Ok(Self::new(keys, clock))
    }

    /// Returns the next live key using round-robin, reintegrating any key
    /// whose cooldown has expired first.
    pub async fn acquire(&self) -> Result<ApiKey, KeyError> {
        let mut state = self.state.lock().await;
        self.reintegrate_expired(&mut state);

        let Some(key) = state.live.pop_front() else {
            return Err(KeyError::NoKeysAvailable);
        };
        state.live.push_back(key.clone());
        Ok(key)
    }

    /// Removes `key` from the live pool and sets its cooldown. Idempotent:
    /// calling this twice on the same key just refreshes the cooldown.
    pub async fn cooldown(&self, key: &ApiKey, duration: Duration) {
        let mut state = self.state.lock().await;
        state.live.retain(|k| k != key);
        state.cooldowns.retain(|c| &c.key != key);
        let until = self.clock.now() + duration;
        warn!(key = %key.redacted(), cooldown_secs = duration.as_secs(), "key put on cooldown");
        state.cooldowns.push(Cooldown {
            key: key.clone(),
            until,
        });
    }

    /// Clears all cooldowns and restores the original pool.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.cooldowns.clear();
        state.live = self.original.iter().cloned().collect();
        info!(count = self.original.len(), "key rotator reset");
    }

    fn reintegrate_expired(&self, state: &mut RotatorState) {
        let now = self.clock.now();
        let (expired, still_cooling): (Vec<_>, Vec<_>) =
            state.cooldowns.drain(..).partition(|c| c.until <= now);
        state.cooldowns = still_cooling;
        for c in expired {
            info!(key = %c.key.redacted(), "key cooldown expired, reintegrated");
            state.live.push_back(c.key);
        }
    }
}
