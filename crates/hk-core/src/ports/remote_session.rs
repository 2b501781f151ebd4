use async_trait::async_trait;
use thiserror::Error;

use crate::ids::AccountId;
use crate::security::ApiKey;

/// Whether the remote service holds a session for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPresence {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteSessionError {
    #[error("remote service rejected the api key")]
    Unauthorized,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote service error: {0}")]
    Service(String),
}

/// Remote health-data service.
///
/// 远端健康数据服务的会话接口。
#[async_trait]
pub trait RemoteSessionPort: Send + Sync {
    /// Does a session already exist for `account_id`?
    async fn query_existing_session(
        &self,
        account_id: &AccountId,
    ) -> Result<SessionPresence, RemoteSessionError>;

    /// Open a sync session and transfer the available health data.
    ///
    /// Completes only once the transfer has finished or failed.
    async fn open_sync_session(
        &self,
        account_id: &AccountId,
        api_key: &ApiKey,
    ) -> Result<(), RemoteSessionError>;

    /// Tear down the session for `account_id`. Closing an absent session is not an error.
    async fn close_session(&self, account_id: &AccountId) -> Result<(), RemoteSessionError>;
}

#[cfg(test)]
mockall::mock! {
    pub RemoteSession {}

    #[async_trait]
    impl RemoteSessionPort for RemoteSession {
        async fn query_existing_session(
            &self,
            account_id: &AccountId,
        ) -> Result<SessionPresence, RemoteSessionError>;
        async fn open_sync_session(
            &self,
            account_id: &AccountId,
            api_key: &ApiKey,
        ) -> Result<(), RemoteSessionError>;
        async fn close_session(&self, account_id: &AccountId) -> Result<(), RemoteSessionError>;
    }
}
