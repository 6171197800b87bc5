//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`CoordinatorConfig::lock_timeout_ms`].
pub const LOCK_TIMEOUT_ENV: &str = "FARMGATE_LOCK_TIMEOUT_MS";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long a caller waits for another request's lock on the same order
    /// before failing with a lock timeout.
    pub lock_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            lock_timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Defaults overridden by `FARMGATE_LOCK_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.lock_timeout_ms = ms,
                Err(e) => tracing::warn!(
                    value = %raw,
                    error = %e,
                    "ignoring invalid {LOCK_TIMEOUT_ENV}, using default"
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_five_seconds() {
        assert_eq!(CoordinatorConfig::default().lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn env_override_is_parsed() {
        let config = CoordinatorConfig::from_lookup(|_| Some(" 250 ".to_string()));
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn invalid_env_value_falls_back_to_default() {
        let config = CoordinatorConfig::from_lookup(|_| Some("soon".to_string()));
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn deserializes_with_missing_fields_defaulted() {
        let config: CoordinatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CoordinatorConfig::default());

        let config: CoordinatorConfig = serde_json::from_str(r#"{"lock_timeout_ms": 10}"#).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(10));
    }
}
