use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round trips attempted before the connection is considered broken
pub const MAX_SYNC_ATTEMPTS: u32 = 10;
pub const MIN_BACKOFF_DELAY: Duration = Duration::from_millis(200);
pub const RANDOM_BACKOFF_DELAY: Duration = Duration::from_millis(800);
/// Delay before pushing a local change
pub const DIRTY_SYNC_DELAY: Duration = Duration::from_millis(500);
pub const MIN_IDLE_SYNC_DELAY: Duration = Duration::from_millis(500);
pub const MAX_IDLE_SYNC_DELAY: Duration = Duration::from_millis(4000);

/// Sync client settings. Delays are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub max_sync_attempts: u32,
    pub min_backoff_delay: u64,
    pub random_backoff_delay: u64,
    pub dirty_sync_delay: u64,
    pub min_idle_sync_delay: u64,
    pub max_idle_sync_delay: u64,

    /// Schedule round trips from [`SyncClient::run`](crate::SyncClient::run)
    pub auto_sync: bool,

    /// Explicit client identity; a persisted key is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_sync_attempts: MAX_SYNC_ATTEMPTS,
            min_backoff_delay: MIN_BACKOFF_DELAY.as_millis() as u64,
            random_backoff_delay: RANDOM_BACKOFF_DELAY.as_millis() as u64,
            dirty_sync_delay: DIRTY_SYNC_DELAY.as_millis() as u64,
            min_idle_sync_delay: MIN_IDLE_SYNC_DELAY.as_millis() as u64,
            max_idle_sync_delay: MAX_IDLE_SYNC_DELAY.as_millis() as u64,
            auto_sync: true,
            client_key: None,
        }
    }
}

impl SyncConfig {
    /// Delay before retry attempt number `attempt` (1-based). The first
    /// attempt is immediate.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let jitter = rand::random::<f64>() * self.random_backoff_delay as f64;
        Duration::from_millis(self.min_backoff_delay) + Duration::from_millis(jitter as u64)
    }

    pub fn dirty_delay(&self) -> Duration {
        Duration::from_millis(self.dirty_sync_delay)
    }

    /// Heartbeat delay; grows with the time since anything changed remotely
    pub fn idle_delay(&self, quiet_for: Duration) -> Duration {
        quiet_for.clamp(
            Duration::from_millis(self.min_idle_sync_delay),
            Duration::from_millis(self.max_idle_sync_delay.max(self.min_idle_sync_delay)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let config: SyncConfig = serde_json::from_str(r#"{"autoSync": false, "maxSyncAttempts": 3}"#).unwrap();
        assert!(!config.auto_sync);
        assert_eq!(config.max_sync_attempts, 3);
        assert_eq!(config.dirty_sync_delay, 500);
    }

    #[test]
    fn test_backoff_range() {
        let config = SyncConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::ZERO);
        for attempt in 2..=10 {
            let delay = config.backoff_delay(attempt);
            assert!(delay >= MIN_BACKOFF_DELAY);
            assert!(delay <= MIN_BACKOFF_DELAY + RANDOM_BACKOFF_DELAY);
        }
    }

    #[test]
    fn test_idle_delay_grows_to_cap() {
        let config = SyncConfig::default();
        assert_eq!(config.idle_delay(Duration::ZERO), MIN_IDLE_SYNC_DELAY);
        assert_eq!(config.idle_delay(Duration::from_millis(1500)), Duration::from_millis(1500));
        assert_eq!(config.idle_delay(Duration::from_secs(60)), MAX_IDLE_SYNC_DELAY);
    }
}
