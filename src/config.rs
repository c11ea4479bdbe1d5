//! Application-level runtime configuration.

use std::{env, time::Duration};

use tracing::warn;

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api-web.nhle.com/v1";
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SNAPSHOT_TTL_MS: u64 = 30_000;
const DEFAULT_SYNC_INTERVAL_MS: u64 = 60_000;
const DEFAULT_SYNC_PAGE_LIMIT: i64 = 1_000;
const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the external schedule/score API.
    pub upstream_base_url: String,
    /// Per-request timeout for upstream fetches.
    pub fetch_timeout: Duration,
    /// How long a cached game status snapshot stays fresh.
    pub snapshot_ttl: Duration,
    /// Cadence of the status-sync scheduler.
    pub sync_interval: Duration,
    /// Page size loaded per synchronization pass.
    pub sync_page_limit: i64,
    /// Per-topic broadcast channel capacity.
    pub broadcast_capacity: usize,
}

impl AppConfig {
    /// Load the configuration from `PICKEM_*` environment variables, falling
    /// back to defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        Self {
            upstream_base_url: env::var("PICKEM_UPSTREAM_URL")
                .ok()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_owned()),
            fetch_timeout: env_duration_ms("PICKEM_FETCH_TIMEOUT_MS", DEFAULT_FETCH_TIMEOUT_MS),
            snapshot_ttl: env_duration_ms("PICKEM_SNAPSHOT_TTL_MS", DEFAULT_SNAPSHOT_TTL_MS),
            sync_interval: env_duration_ms("PICKEM_SYNC_INTERVAL_MS", DEFAULT_SYNC_INTERVAL_MS),
            sync_page_limit: env_parse("PICKEM_SYNC_PAGE_LIMIT", DEFAULT_SYNC_PAGE_LIMIT),
            broadcast_capacity: env_parse("PICKEM_BROADCAST_CAPACITY", DEFAULT_BROADCAST_CAPACITY),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_owned(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            snapshot_ttl: Duration::from_millis(DEFAULT_SNAPSHOT_TTL_MS),
            sync_interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            sync_page_limit: DEFAULT_SYNC_PAGE_LIMIT,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    Duration::from_millis(env_parse(var, default))
}

fn env_parse<T>(var: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var, value = %raw, "unparsable configuration value; using default");
            default
        }),
        Err(_) => default,
    }
}
