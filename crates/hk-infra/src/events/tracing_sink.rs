use async_trait::async_trait;
use hk_core::ports::ConnectionEventPort;
use hk_core::{AccountId, ConnectionError, ConnectionSnapshot};

/// Notification hook that only logs. Used when the host registers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConnectionEvents;

#[async_trait]
impl ConnectionEventPort for TracingConnectionEvents {
    async fn emit_snapshot(&self, account_id: &AccountId, snapshot: ConnectionSnapshot) {
        tracing::info!(
            account_id = %account_id,
            state = ?snapshot.state,
            button = %snapshot.projection.button_label,
            enabled = snapshot.projection.button_enabled_for_action,
            "connection snapshot"
        );
    }

    async fn emit_error(&self, account_id: &AccountId, error: ConnectionError) {
        tracing::warn!(
            account_id = %account_id,
            error = %error,
            hint = error.user_hint().unwrap_or_default(),
            "connection error"
        );
    }

    async fn emit_status_confirmed(&self, account_id: &AccountId, snapshot: ConnectionSnapshot) {
        tracing::debug!(account_id = %account_id, state = ?snapshot.state, "connection status confirmed");
    }
}
