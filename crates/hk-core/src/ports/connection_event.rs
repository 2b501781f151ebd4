use crate::connection::{ConnectionError, ConnectionSnapshot};
use crate::ids::AccountId;

/// Outbound notifications for the hosting screen.
///
/// 连接状态变化 / 错误通知。
#[async_trait::async_trait]
pub trait ConnectionEventPort: Send + Sync {
    async fn emit_snapshot(&self, account_id: &AccountId, snapshot: ConnectionSnapshot);

    /// Recoverable failures only; the widget keeps working afterwards.
    async fn emit_error(&self, account_id: &AccountId, error: ConnectionError);

    /// Remote status confirmed by a query; the state may not have changed.
    async fn emit_status_confirmed(&self, _account_id: &AccountId, _snapshot: ConnectionSnapshot) {}
}

#[cfg(test)]
mockall::mock! {
    pub ConnectionEvents {}

    #[async_trait::async_trait]
    impl ConnectionEventPort for ConnectionEvents {
        async fn emit_snapshot(&self, account_id: &AccountId, snapshot: ConnectionSnapshot);
        async fn emit_error(&self, account_id: &AccountId, error: ConnectionError);
        async fn emit_status_confirmed(&self, account_id: &AccountId, snapshot: ConnectionSnapshot);
    }
}
