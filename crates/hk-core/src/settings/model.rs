use serde::{Deserialize, Serialize};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Backoff for inconclusive status refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshRetrySettings {
    /// 0 disables retrying.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// 同步会话超时时间 (秒)
    pub sync_timeout_secs: u64,

    /// Controller queue depth; triggers beyond it are dropped.
    pub event_queue_capacity: usize,

    pub refresh_retry: RefreshRetrySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub connection: ConnectionSettings,
}

fn current_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}
