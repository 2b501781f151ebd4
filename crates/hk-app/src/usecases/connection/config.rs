use hk_core::settings::model::Settings;
use hk_core::ConnectionPolicy;

/// 连接控制器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub policy: ConnectionPolicy,
    /// Bounded queue depth for triggers and completions.
    pub event_queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ControllerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let connection = &settings.connection;
        Self {
            policy: ConnectionPolicy::from(connection),
            event_queue_capacity: connection.event_queue_capacity.max(1),
        }
    }
}
