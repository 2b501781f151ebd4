use async_trait::async_trait;
use thiserror::Error;

/// Outcome of a permission prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    /// Declined by the user or by platform policy.
    Denied { reason: Option<String> },
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthPermissionError {
    #[error("health data is not available on this device")]
    Unavailable,

    #[error("permission request failed: {0}")]
    Platform(String),
}

/// Platform health-data permission prompt.
///
/// 平台健康数据授权。
#[async_trait]
pub trait HealthPermissionPort: Send + Sync {
    /// Ask the platform for read access to health data.
    ///
    /// May suspend for a long time while the user answers the system prompt.
    /// Any error is treated as a denial by the caller.
    async fn request_health_data_permission(
        &self,
    ) -> Result<PermissionStatus, HealthPermissionError>;
}

#[cfg(test)]
mockall::mock! {
    pub HealthPermission {}

    #[async_trait]
    impl HealthPermissionPort for HealthPermission {
        async fn request_health_data_permission(
            &self,
        ) -> Result<PermissionStatus, HealthPermissionError>;
    }
}
