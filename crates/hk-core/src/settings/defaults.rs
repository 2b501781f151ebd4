use super::model::*;

impl Default for RefreshRetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            sync_timeout_secs: 120, // 2 minutes
            event_queue_capacity: 32,
            refresh_retry: RefreshRetrySettings::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            connection: ConnectionSettings::default(),
        }
    }
}
