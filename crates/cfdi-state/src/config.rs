//! Lifecycle tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Authority calls per operation, counting the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Deadline for a single authority call.
    #[serde(with = "millis")]
    pub call_timeout: Duration,
    /// Below this many remaining credits a warning is logged.
    pub low_credit_threshold: i64,
    pub check_credits_before_stamp: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            call_timeout: Duration::from_secs(30),
            low_credit_threshold: 10,
            check_credits_before_stamp: true,
        }
    }
}

impl LifecycleConfig {
    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let config = LifecycleConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
        assert_eq!(config.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LifecycleConfig = serde_json::from_str(r#"{"max_attempts": 5, "base_delay": 50}"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(50));
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert!(config.check_credits_before_stamp);
    }
}
