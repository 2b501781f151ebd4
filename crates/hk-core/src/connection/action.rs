use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ConnectionError;
use super::event::{ConnectionEvent, Ticket};
use super::state::{ConnectionState, DisplayProjection};

/// Why the remote session is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// User tapped "Disconnect".
    UserDisconnect,
    /// A sync session failed, timed out or was torn down mid-flight.
    ReleasePartial,
}

/// Timers owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// Deadline for the running sync session.
    SyncDeadline,
    /// Backoff before retrying an inconclusive status refresh.
    RefreshRetry,
}

/// Side-effects produced by state transitions.
///
/// 这些动作由 controller 执行,实现状态机的副作用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionAction {
    /// Ask the remote service whether a session exists for the account.
    QueryExistingSession { ticket: Ticket },
    /// Ask the platform for health-data permission.
    RequestPermission { ticket: Ticket },
    /// Open a sync session and transfer available health data.
    OpenSyncSession { ticket: Ticket },
    /// Tear down the remote session; completion comes back as
    /// `SessionClosed` or `SessionCloseFailed` with the same ticket.
    CloseSession { ticket: Ticket, reason: CloseReason },
    /// Cancel an in-flight operation; its completion must not be delivered.
    AbortOperation { ticket: Ticket },
    /// Deliver `fire` back into the machine at `deadline`.
    StartTimer {
        kind: TimerKind,
        deadline: DateTime<Utc>,
        fire: ConnectionEvent,
    },
    CancelTimer { kind: TimerKind },
    /// State changed; re-render.
    PublishProjection {
        state: ConnectionState,
        projection: DisplayProjection,
    },
    /// A status query answered conclusively, whether or not the state changed.
    ConfirmStatus { state: ConnectionState },
    /// Recoverable error for the host's notification hook.
    Notify { error: ConnectionError },
    /// Event absorbed without effect.
    Ignored { error: ConnectionError },
    /// 记录状态转换日志 (用于审计)
    LogTransition {
        old_state: ConnectionState,
        event: String,
        new_state: ConnectionState,
    },
}
