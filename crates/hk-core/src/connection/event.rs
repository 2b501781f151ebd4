use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifier of one asynchronous operation started by the state machine.
///
/// Completions carrying a ticket that no longer matches the in-flight
/// operation are stale and get absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(u64);

impl Ticket {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for Ticket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of asking the remote service whether a session exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionQueryOutcome {
    Present,
    Absent,
    /// Transient failure; the previously displayed state is kept.
    Unknown(String),
}

/// Events that drive the connection state machine.
///
/// 驱动连接状态机的事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Widget attached to a screen; advisory status refresh.
    ///
    /// 组件挂载到界面。
    Attached,
    /// Backoff timer for a failed status refresh fired.
    ///
    /// 状态查询重试定时器到期。
    RefreshRetryDue,
    /// User tapped the single action button.
    ///
    /// 用户点击按钮。
    Activate,
    /// Remote session query finished.
    ///
    /// 远端会话查询完成。
    SessionQueryResolved {
        ticket: Ticket,
        outcome: SessionQueryOutcome,
    },
    /// Platform granted health-data access.
    ///
    /// 平台授予健康数据权限。
    PermissionGranted { ticket: Ticket },
    /// Platform (or the user) declined health-data access.
    ///
    /// 权限被拒绝。
    PermissionDenied {
        ticket: Ticket,
        reason: Option<String>,
    },
    /// Sync session completed successfully.
    ///
    /// 同步会话成功。
    SyncSucceeded { ticket: Ticket },
    /// Sync session failed.
    ///
    /// 同步会话失败。
    SyncFailed { ticket: Ticket, reason: String },
    /// Sync session deadline elapsed without a completion.
    ///
    /// 同步会话超时。
    SyncTimedOut { ticket: Ticket },
    /// Remote session closed.
    ///
    /// 远端会话已关闭。
    SessionClosed { ticket: Ticket },
    /// Closing the remote session failed.
    ///
    /// 关闭远端会话失败。
    SessionCloseFailed { ticket: Ticket, reason: String },
    /// Owning widget is being destroyed.
    ///
    /// 组件销毁。
    Teardown,
}

impl ConnectionEvent {
    /// Short name used in logs and in `IllegalTransition` errors.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionEvent::Attached => "attached",
            ConnectionEvent::RefreshRetryDue => "refresh_retry_due",
            ConnectionEvent::Activate => "activate",
            ConnectionEvent::SessionQueryResolved { .. } => "session_query_resolved",
            ConnectionEvent::PermissionGranted { .. } => "permission_granted",
            ConnectionEvent::PermissionDenied { .. } => "permission_denied",
            ConnectionEvent::SyncSucceeded { .. } => "sync_succeeded",
            ConnectionEvent::SyncFailed { .. } => "sync_failed",
            ConnectionEvent::SyncTimedOut { .. } => "sync_timed_out",
            ConnectionEvent::SessionClosed { .. } => "session_closed",
            ConnectionEvent::SessionCloseFailed { .. } => "session_close_failed",
            ConnectionEvent::Teardown => "teardown",
        }
    }

    /// Ticket of the operation this event completes, if any.
    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            ConnectionEvent::SessionQueryResolved { ticket, .. }
            | ConnectionEvent::PermissionGranted { ticket }
            | ConnectionEvent::PermissionDenied { ticket, .. }
            | ConnectionEvent::SyncSucceeded { ticket }
            | ConnectionEvent::SyncFailed { ticket, .. }
            | ConnectionEvent::SyncTimedOut { ticket }
            | ConnectionEvent::SessionClosed { ticket }
            | ConnectionEvent::SessionCloseFailed { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}
