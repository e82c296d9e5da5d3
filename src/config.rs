//! Process configuration, read from the environment via `clap`'s `env`
//! feature. Mirrors `collector/config.py` reading `YT_API_KEYS`,
//! `REDIS_URL`, `BROKER_URL` and `REDIS_MAX_CONNECTIONS` at startup.

use std::sync::Arc;

use clap::Parser;

use crate::clock::Clock;
use crate::error::ConfigError;
use crate::keys::KeyRotator;

#[derive(Debug, Clone, Parser)]
#[command(name = "channel-collector", about = "YouTube channel resolution collector")]
pub struct Config {
    /// Comma-separated pool of YouTube Data API v3 keys.
    #[arg(long, env = "YT_API_KEYS")]
    pub yt_api_keys: String,

    /// Connection string for the shared counter/lock service.
    #[arg(long, env = "REDIS_URL", default_value = "localhost:6379/0")]
    pub redis_url: String,

    /// Connection string for the work-queue broker.
    #[arg(long, env = "BROKER_URL", default_value = "localhost:6379/1")]
    pub broker_url: String,

    /// Maximum connections the counter-service client may open.
    #[arg(long, env = "REDIS_MAX_CONNECTIONS", default_value_t = 50)]
    pub redis_max_connections: u32,

    /// Soft time limit on a single Job's resolver call, humantime syntax
    /// (e.g. "60s", "2m").
    #[arg(long, env = "SOFT_TTL", default_value = "60s")]
    pub soft_ttl: String,
}

impl Config {
    /// Builds the `KeyRotator` described by `yt_api_keys`. Fails the same
    /// way a missing/empty `YT_API_KEYS` does at process startup in the
    /// reference implementation: loud, before anything else starts.
    pub fn key_rotator(&self, clock: Arc<dyn Clock>) -> Result<KeyRotator, ConfigError> {
        KeyRotator::from_comma_separated(&self.yt_api_keys, clock)
    }

    /// Parses `soft_ttl` into a `Duration`, falling back to the worker's
    /// built-in default on a malformed value rather than failing startup
    /// over a cosmetic flag.
    pub fn soft_ttl(&self) -> std::time::Duration {
        humantime::parse_duration(&self.soft_ttl).unwrap_or(crate::worker::DEFAULT_SOFT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn key_rotator_rejects_empty_key_list() {
        let config = Config {
            yt_api_keys: " , ".to_string(),
            redis_url: "localhost:6379/0".to_string(),
            broker_url: "localhost:6379/1".to_string(),
            redis_max_connections: 50,
            soft_ttl: "60s".to_string(),
        };
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new());
        assert!(config.key_rotator(clock).is_err());
    }

    #[test]
    fn parses_from_args_with_env_fallback() {
        let config = Config::parse_from(["collector", "--yt-api-keys", "k1,k2"]);
        assert_eq!(config.yt_api_keys, "k1,k2");
        assert_eq!(config.redis_url, "localhost:6379/0");
        assert_eq!(config.redis_max_connections, 50);
    }
}
