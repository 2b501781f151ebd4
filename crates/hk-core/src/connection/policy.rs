use std::time::Duration;

use crate::settings::model::{ConnectionSettings, RefreshRetrySettings};

/// Upper bound for the sync deadline (one day).
const MAX_SYNC_TIMEOUT_SECS: u64 = 86_400;

/// Backoff policy for inconclusive status refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRetryPolicy {
    /// Retries after the initial query; 0 disables retrying.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RefreshRetryPolicy {
    /// Delay before retry `attempt` (1-based): `initial * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&RefreshRetrySettings> for RefreshRetryPolicy {
    fn from(settings: &RefreshRetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms.max(settings.initial_delay_ms)),
        }
    }
}

/// 连接状态机策略配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Sync session assumed failed after this many seconds without completion.
    pub sync_timeout_secs: i64,
    pub refresh_retry: RefreshRetryPolicy,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self::from(&ConnectionSettings::default())
    }
}

impl From<&ConnectionSettings> for ConnectionPolicy {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            sync_timeout_secs: settings.sync_timeout_secs.clamp(1, MAX_SYNC_TIMEOUT_SECS) as i64,
            refresh_retry: RefreshRetryPolicy::from(&settings.refresh_retry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RefreshRetryPolicy {
        RefreshRetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn zero_sync_timeout_is_clamped() {
        let settings = ConnectionSettings {
            sync_timeout_secs: 0,
            ..ConnectionSettings::default()
        };
        assert_eq!(ConnectionPolicy::from(&settings).sync_timeout_secs, 1);

        let settings = ConnectionSettings {
            sync_timeout_secs: u64::MAX,
            ..ConnectionSettings::default()
        };
        assert_eq!(
            ConnectionPolicy::from(&settings).sync_timeout_secs,
            MAX_SYNC_TIMEOUT_SECS as i64
        );
    }
}
