use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_queue_size: u32,
    pub persist_queue: bool,
}

/// Retry policy shared by the entity transitions and the coordinator.
/// The jitter ratio and backoff formulas are tunables, not constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub exponential_backoff: bool,
    pub jitter_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub max_concurrent_syncs: u32,
    pub sync_timeout_ms: u64,
    pub periodic_sync_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/scoutsync.db".to_string(),
                max_connections: 5,
                connection_timeout: 30,
            },
            queue: QueueConfig {
                max_queue_size: 500,
                persist_queue: true,
            },
            retry: RetryConfig::default(),
            sync: SyncConfig {
                max_concurrent_syncs: 4,
                sync_timeout_ms: 30_000,
                periodic_sync_interval_ms: 300_000, // 5 minutes
            },
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            exponential_backoff: true,
            jitter_ratio: 0.3,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before the given attempt (1-based).
    ///
    /// Exponential: `min(base * 2^(attempt-1) + jitter, max)`.
    /// Linear: `min(base * attempt + jitter, max)`.
    /// Jitter is uniform in `[0, jitter_ratio * base]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.delay_millis(attempt, self.sample_jitter());
        Duration::milliseconds(millis as i64)
    }

    /// Deterministic part of the delay computation, kept separate so the
    /// monotonicity and cap properties are testable without randomness.
    pub(crate) fn delay_millis(&self, attempt: u32, jitter_ms: u64) -> u64 {
        let attempt = attempt.max(1);
        let base = self.base_retry_delay_ms;
        let raw = if self.exponential_backoff {
            base.saturating_mul(1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX))
        } else {
            base.saturating_mul(attempt as u64)
        };
        raw.saturating_add(jitter_ms).min(self.max_retry_delay_ms)
    }

    fn sample_jitter(&self) -> u64 {
        let span = (self.base_retry_delay_ms as f64 * self.jitter_ratio).max(0.0);
        if span < 1.0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=span as u64)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SCOUTSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_MAX_QUEUE_SIZE") {
            if let Some(value) = parse_u64(&v) {
                cfg.queue.max_queue_size = value.max(1) as u32;
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_PERSIST_QUEUE") {
            cfg.queue.persist_queue = parse_bool(&v, cfg.queue.persist_queue);
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_MAX_RETRIES") {
            if let Some(value) = parse_u64(&v) {
                cfg.retry.max_retries = value as u32;
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_BASE_RETRY_DELAY_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.retry.base_retry_delay_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_MAX_RETRY_DELAY_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.retry.max_retry_delay_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_EXPONENTIAL_BACKOFF") {
            cfg.retry.exponential_backoff = parse_bool(&v, cfg.retry.exponential_backoff);
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_JITTER_RATIO") {
            if let Some(value) = parse_f64(&v) {
                cfg.retry.jitter_ratio = value.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_MAX_CONCURRENT_SYNCS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.max_concurrent_syncs = value.max(1) as u32;
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_SYNC_TIMEOUT_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.sync_timeout_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("SCOUTSYNC_PERIODIC_SYNC_INTERVAL_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.periodic_sync_interval_ms = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.queue.max_queue_size == 0 {
            return Err("Queue max_queue_size must be greater than 0".to_string());
        }
        if self.retry.base_retry_delay_ms == 0 {
            return Err("Retry base_retry_delay_ms must be greater than 0".to_string());
        }
        if self.retry.max_retry_delay_ms < self.retry.base_retry_delay_ms {
            return Err("Retry max_retry_delay_ms must be >= base_retry_delay_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_ratio) {
            return Err("Retry jitter_ratio must be within [0, 1]".to_string());
        }
        if self.sync.max_concurrent_syncs == 0 {
            return Err("Sync max_concurrent_syncs must be greater than 0".to_string());
        }
        if self.sync.sync_timeout_ms == 0 {
            return Err("Sync sync_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}
