//! Connection lifecycle state machine
//!
//! 这个模块实现了 HealthKit 连接的显式状态机。
//!
//! # Design Principles / 设计原则
//!
//! - **单一按钮,多重含义**: `Activate` 的含义完全由当前状态决定 (连接 / 忽略 / 断开)
//! - **审计友好**: 每次状态转换都记录旧状态、事件、新状态
//! - **可测试**: 纯函数式状态转换 `(state, event) -> (new_state, actions[])`
//! - **票据**: 每个异步操作带一个 `Ticket`,过期的完成事件会被吸收
//! - **关闭也是操作**: 关闭远端会话完成之前,挂载和点击会被暂存,完成后再处理
//!
//! # Architecture / 架构
//!
//! ```text
//! ConnectionStateMachine (hk-core)
//!   ├── State: NotConnected / Syncing / Connected
//!   ├── Event: attach, activate, permission / sync / query completions
//!   └── Action: port calls, timers, projection updates, notifications
//!
//! ConnectionController (hk-app)
//!   ├── 串行事件队列
//!   ├── 调用状态机获取 actions
//!   └── 执行 actions (权限请求 / 同步会话 / 定时器 / 通知)
//! ```

use chrono::{DateTime, Utc};

use super::action::{CloseReason, ConnectionAction, TimerKind};
use super::error::ConnectionError;
use super::event::{ConnectionEvent, SessionQueryOutcome, Ticket};
use super::policy::ConnectionPolicy;
use super::state::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationKind {
    Refresh,
    Permission,
    Sync,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    kind: OperationKind,
    ticket: Ticket,
}

/// Bookkeeping that never shows up in [`ConnectionState`].
#[derive(Debug, Clone, Default)]
struct ConnectionContext {
    /// At most one asynchronous operation runs at a time.
    in_flight: Option<InFlight>,
    next_ticket: u64,
    /// Retries spent since the last attach.
    refresh_attempts: u32,
    retry_scheduled: bool,
    /// Triggers that arrived while a close was still running.
    held_refresh: bool,
    held_activate: bool,
    torn_down: bool,
}

/// 连接状态机
///
/// Owns the [`ConnectionState`] of one widget and turns events into
/// transitions plus the actions the controller must execute.
///
/// # Example / 示例
///
/// ```
/// use chrono::Utc;
/// use hk_core::connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine};
///
/// let mut sm = ConnectionStateMachine::new();
/// let (state, _actions) = sm.handle_event(ConnectionEvent::Activate, Utc::now());
/// assert_eq!(state, ConnectionState::NotConnected);
/// assert!(sm.has_operation_in_flight());
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    context: ConnectionContext,
    policy: ConnectionPolicy,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::with_policy(ConnectionPolicy::default())
    }

    pub fn with_policy(policy: ConnectionPolicy) -> Self {
        Self {
            state: ConnectionState::NotConnected,
            context: ConnectionContext::default(),
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    pub fn has_operation_in_flight(&self) -> bool {
        self.context.in_flight.is_some()
    }

    pub fn in_flight_ticket(&self) -> Option<Ticket> {
        self.context.in_flight.map(|op| op.ticket)
    }

    pub fn is_torn_down(&self) -> bool {
        self.context.torn_down
    }

    /// 处理事件并返回新状态和动作列表
    ///
    /// The first action is always `LogTransition`; a `PublishProjection` is
    /// appended whenever the state changed.
    pub fn handle_event(
        &mut self,
        event: ConnectionEvent,
        now: DateTime<Utc>,
    ) -> (ConnectionState, Vec<ConnectionAction>) {
        let old_state = self.state;
        let event_debug = format!("{:?}", event);

        let (new_state, actions) = self.transition(event, now);

        let mut all_actions = vec![ConnectionAction::LogTransition {
            old_state,
            event: event_debug,
            new_state,
        }];
        all_actions.extend(actions);
        if new_state != old_state {
            all_actions.push(ConnectionAction::PublishProjection {
                state: new_state,
                projection: new_state.projection(),
            });
        }

        self.state = new_state;
        (new_state, all_actions)
    }

    /// 状态转换逻辑 (核心实现)
    fn transition(
        &mut self,
        event: ConnectionEvent,
        now: DateTime<Utc>,
    ) -> (ConnectionState, Vec<ConnectionAction>) {
        if self.context.torn_down {
            return self.absorb(&event);
        }

        match (self.state, event) {
            (_, ConnectionEvent::Teardown) => self.teardown(),
            (
                ConnectionState::NotConnected | ConnectionState::Connected,
                ConnectionEvent::Attached,
            ) => self.start_refresh(true),
            (
                ConnectionState::NotConnected | ConnectionState::Connected,
                ConnectionEvent::RefreshRetryDue,
            ) => {
                self.context.retry_scheduled = false;
                self.start_refresh(false)
            }
            (ConnectionState::NotConnected, ConnectionEvent::Activate) => {
                self.request_permission()
            }
            (ConnectionState::Connected, ConnectionEvent::Activate) => self.disconnect(),
            (state, ConnectionEvent::SessionQueryResolved { ticket, outcome })
                if self.is_in_flight(OperationKind::Refresh, ticket) =>
            {
                self.resolve_query(state, outcome, now)
            }
            (ConnectionState::NotConnected, ConnectionEvent::PermissionGranted { ticket })
                if self.is_in_flight(OperationKind::Permission, ticket) =>
            {
                self.begin_sync(now)
            }
            (
                ConnectionState::NotConnected,
                ConnectionEvent::PermissionDenied { ticket, reason },
            ) if self.is_in_flight(OperationKind::Permission, ticket) => {
                self.context.in_flight = None;
                (
                    ConnectionState::NotConnected,
                    vec![ConnectionAction::Notify {
                        error: ConnectionError::PermissionDenied { reason },
                    }],
                )
            }
            (ConnectionState::Syncing, ConnectionEvent::SyncSucceeded { ticket })
                if self.is_in_flight(OperationKind::Sync, ticket) =>
            {
                self.context.in_flight = None;
                (
                    ConnectionState::Connected,
                    vec![ConnectionAction::CancelTimer {
                        kind: TimerKind::SyncDeadline,
                    }],
                )
            }
            (ConnectionState::Syncing, ConnectionEvent::SyncFailed { ticket, reason })
                if self.is_in_flight(OperationKind::Sync, ticket) =>
            {
                self.context.in_flight = None;
                (
                    ConnectionState::NotConnected,
                    vec![
                        ConnectionAction::CancelTimer {
                            kind: TimerKind::SyncDeadline,
                        },
                        self.begin_close(CloseReason::ReleasePartial),
                        ConnectionAction::Notify {
                            error: ConnectionError::SyncFailed { reason },
                        },
                    ],
                )
            }
            (ConnectionState::Syncing, ConnectionEvent::SyncTimedOut { ticket })
                if self.is_in_flight(OperationKind::Sync, ticket) =>
            {
                self.context.in_flight = None;
                (
                    ConnectionState::NotConnected,
                    vec![
                        ConnectionAction::AbortOperation { ticket },
                        self.begin_close(CloseReason::ReleasePartial),
                        ConnectionAction::Notify {
                            error: ConnectionError::SyncTimedOut {
                                after_secs: self.policy.sync_timeout_secs.max(0) as u64,
                            },
                        },
                    ],
                )
            }
            (_, ConnectionEvent::SessionClosed { ticket })
                if self.is_in_flight(OperationKind::Close, ticket) =>
            {
                self.finish_close(None)
            }
            (_, ConnectionEvent::SessionCloseFailed { ticket, reason })
                if self.is_in_flight(OperationKind::Close, ticket) =>
            {
                self.finish_close(Some(reason))
            }
            (_, event) => self.absorb(&event),
        }
    }

    fn is_in_flight(&self, kind: OperationKind, ticket: Ticket) -> bool {
        self.context.in_flight == Some(InFlight { kind, ticket })
    }

    fn issue(&mut self, kind: OperationKind) -> Ticket {
        self.context.next_ticket += 1;
        let ticket = Ticket::new(self.context.next_ticket);
        self.context.in_flight = Some(InFlight { kind, ticket });
        ticket
    }

    fn cancel_retry_timer(&mut self, actions: &mut Vec<ConnectionAction>) {
        if self.context.retry_scheduled {
            self.context.retry_scheduled = false;
            actions.push(ConnectionAction::CancelTimer {
                kind: TimerKind::RefreshRetry,
            });
        }
    }

    /// Attach-time checks are advisory: they never preempt a pending user action.
    fn start_refresh(&mut self, reset_attempts: bool) -> (ConnectionState, Vec<ConnectionAction>) {
        match self.context.in_flight {
            // The remote still holds the session being closed; ask once it is gone.
            Some(InFlight {
                kind: OperationKind::Close,
                ..
            }) => {
                self.context.held_refresh = true;
                (self.state, Vec::new())
            }
            // Coalesce with the refresh already running.
            Some(InFlight {
                kind: OperationKind::Refresh,
                ..
            }) => (self.state, Vec::new()),
            Some(_) => self.absorb(&ConnectionEvent::Attached),
            None => {
                if reset_attempts {
                    self.context.refresh_attempts = 0;
                }
                let mut actions = Vec::new();
                self.cancel_retry_timer(&mut actions);
                let ticket = self.issue(OperationKind::Refresh);
                actions.push(ConnectionAction::QueryExistingSession { ticket });
                (self.state, actions)
            }
        }
    }

    fn request_permission(&mut self) -> (ConnectionState, Vec<ConnectionAction>) {
        let mut actions = Vec::new();
        match self.context.in_flight {
            Some(InFlight {
                kind: OperationKind::Permission,
                ..
            }) => return self.absorb(&ConnectionEvent::Activate),
            Some(InFlight {
                kind: OperationKind::Close,
                ..
            }) => {
                self.context.held_activate = true;
                return (ConnectionState::NotConnected, actions);
            }
            // A user action supersedes an advisory refresh.
            Some(InFlight { ticket, .. }) => {
                actions.push(ConnectionAction::AbortOperation { ticket });
            }
            None => {}
        }
        self.cancel_retry_timer(&mut actions);

        let ticket = self.issue(OperationKind::Permission);
        actions.push(ConnectionAction::RequestPermission { ticket });
        (ConnectionState::NotConnected, actions)
    }

    fn disconnect(&mut self) -> (ConnectionState, Vec<ConnectionAction>) {
        let mut actions = Vec::new();
        if let Some(InFlight { ticket, .. }) = self.context.in_flight.take() {
            actions.push(ConnectionAction::AbortOperation { ticket });
        }
        self.cancel_retry_timer(&mut actions);
        self.context.refresh_attempts = 0;
        actions.push(self.begin_close(CloseReason::UserDisconnect));
        (ConnectionState::NotConnected, actions)
    }

    fn begin_close(&mut self, reason: CloseReason) -> ConnectionAction {
        let ticket = self.issue(OperationKind::Close);
        ConnectionAction::CloseSession { ticket, reason }
    }

    /// Close settled: run whatever was held back, a tap before an attach.
    fn finish_close(&mut self, failure: Option<String>) -> (ConnectionState, Vec<ConnectionAction>) {
        self.context.in_flight = None;
        let mut actions = Vec::new();
        if let Some(reason) = failure {
            actions.push(ConnectionAction::Notify {
                error: ConnectionError::SessionCloseFailed { reason },
            });
        }

        let held_activate = std::mem::take(&mut self.context.held_activate);
        let held_refresh = std::mem::take(&mut self.context.held_refresh);
        let (state, resumed) = if held_activate && self.state == ConnectionState::NotConnected {
            self.request_permission()
        } else if held_refresh {
            self.start_refresh(true)
        } else {
            (self.state, Vec::new())
        };
        actions.extend(resumed);
        (state, actions)
    }

    fn resolve_query(
        &mut self,
        state: ConnectionState,
        outcome: SessionQueryOutcome,
        now: DateTime<Utc>,
    ) -> (ConnectionState, Vec<ConnectionAction>) {
        self.context.in_flight = None;
        match outcome {
            SessionQueryOutcome::Present => {
                self.context.refresh_attempts = 0;
                let state = ConnectionState::Connected;
                (state, vec![ConnectionAction::ConfirmStatus { state }])
            }
            SessionQueryOutcome::Absent => {
                self.context.refresh_attempts = 0;
                let state = ConnectionState::NotConnected;
                (state, vec![ConnectionAction::ConfirmStatus { state }])
            }
            SessionQueryOutcome::Unknown(reason) => {
                let mut actions = vec![ConnectionAction::Notify {
                    error: ConnectionError::SessionQueryUnknown { reason },
                }];
                let retry = &self.policy.refresh_retry;
                if self.context.refresh_attempts < retry.max_attempts {
                    self.context.refresh_attempts += 1;
                    let delay = retry.delay_for(self.context.refresh_attempts);
                    self.context.retry_scheduled = true;
                    actions.push(ConnectionAction::StartTimer {
                        kind: TimerKind::RefreshRetry,
                        deadline: deadline_after(now, delay),
                        fire: ConnectionEvent::RefreshRetryDue,
                    });
                }
                (state, actions)
            }
        }
    }

    fn begin_sync(&mut self, now: DateTime<Utc>) -> (ConnectionState, Vec<ConnectionAction>) {
        let ticket = self.issue(OperationKind::Sync);
        let deadline = deadline_after(
            now,
            std::time::Duration::from_secs(self.policy.sync_timeout_secs.max(1) as u64),
        );
        (
            ConnectionState::Syncing,
            vec![
                ConnectionAction::OpenSyncSession { ticket },
                ConnectionAction::StartTimer {
                    kind: TimerKind::SyncDeadline,
                    deadline,
                    fire: ConnectionEvent::SyncTimedOut { ticket },
                },
            ],
        )
    }

    fn teardown(&mut self) -> (ConnectionState, Vec<ConnectionAction>) {
        self.context.torn_down = true;
        self.context.held_activate = false;
        self.context.held_refresh = false;
        let mut actions = Vec::new();
        match self.context.in_flight.take() {
            // A running close is left to finish on its own.
            Some(InFlight {
                kind: OperationKind::Close,
                ..
            })
            | None => {}
            Some(InFlight { ticket, .. }) => {
                actions.push(ConnectionAction::AbortOperation { ticket });
            }
        }
        self.cancel_retry_timer(&mut actions);
        if self.state == ConnectionState::Syncing {
            actions.push(ConnectionAction::CancelTimer {
                kind: TimerKind::SyncDeadline,
            });
            actions.push(self.begin_close(CloseReason::ReleasePartial));
        }
        (self.state, actions)
    }

    /// Events without a transition are absorbed; fast double taps reach this.
    fn absorb(&self, event: &ConnectionEvent) -> (ConnectionState, Vec<ConnectionAction>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            state = ?self.state,
            event = event.name(),
            ticket = ?event.ticket(),
            "connection event absorbed"
        );
        (
            self.state,
            vec![ConnectionAction::Ignored {
                error: ConnectionError::IllegalTransition {
                    state: self.state,
                    event: event.name().to_string(),
                },
            }],
        )
    }
}

fn deadline_after(now: DateTime<Utc>, delay: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(now)
}
