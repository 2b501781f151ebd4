use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hk_core::ports::{HealthPermissionError, HealthPermissionPort, PermissionStatus};

/// Permission prompt with a preconfigured answer.
///
/// Stands in for the platform dialog on hosts without HealthKit.
pub struct FixedHealthPermission {
    answer: Mutex<Result<PermissionStatus, HealthPermissionError>>,
    /// Simulated time the user spends on the prompt.
    delay: Duration,
    requests: AtomicUsize,
}

impl FixedHealthPermission {
    fn answering(answer: Result<PermissionStatus, HealthPermissionError>) -> Self {
        Self {
            answer: Mutex::new(answer),
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::answering(Ok(PermissionStatus::Granted))
    }

    pub fn denied(reason: Option<String>) -> Self {
        Self::answering(Ok(PermissionStatus::Denied { reason }))
    }

    /// Health data not available on this device.
    pub fn unavailable() -> Self {
        Self::answering(Err(HealthPermissionError::Unavailable))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_answer(&self, answer: Result<PermissionStatus, HealthPermissionError>) {
        *self.answer.lock().unwrap_or_else(PoisonError::into_inner) = answer;
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthPermissionPort for FixedHealthPermission {
    async fn request_health_data_permission(
        &self,
    ) -> Result<PermissionStatus, HealthPermissionError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_are_counted_and_switchable() {
        let port = FixedHealthPermission::denied(Some("parental controls".to_string()));
        assert_eq!(
            port.request_health_data_permission().await,
            Ok(PermissionStatus::Denied {
                reason: Some("parental controls".to_string())
            })
        );

        port.set_answer(Ok(PermissionStatus::Granted));
        assert!(port
            .request_health_data_permission()
            .await
            .unwrap()
            .is_granted());
        assert_eq!(port.request_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_is_an_error() {
        let port = FixedHealthPermission::unavailable();
        assert_eq!(
            port.request_health_data_permission().await,
            Err(HealthPermissionError::Unavailable)
        );
    }
}
