use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use hk_core::connection::{
    CloseReason, ConnectionAction, ConnectionEvent, SessionQueryOutcome, TimerKind,
};
use hk_core::ports::{PermissionStatus, SessionPresence};
use hk_core::{ConnectionSession, ConnectionSnapshot, ConnectionStateMachine, Ticket};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::listeners::ProjectionListeners;
use super::ports::ConnectionPorts;

pub(crate) enum ControllerMessage {
    Event(ConnectionEvent),
    /// Barrier: answered once everything queued before it was processed.
    Flush(oneshot::Sender<()>),
}

/// Sequential owner of the state machine.
///
/// Runs as one task per controller. Port calls run in their own tasks and
/// report back through the same queue as user triggers, so the machine only
/// ever sees one event at a time.
pub(crate) struct ConnectionWorker {
    session: Arc<ConnectionSession>,
    machine: ConnectionStateMachine,
    ports: ConnectionPorts,
    tx: mpsc::Sender<ControllerMessage>,
    snapshot_tx: watch::Sender<ConnectionSnapshot>,
    listeners: ProjectionListeners,
    shutdown: CancellationToken,
    /// Cancellation per in-flight operation
    operations: HashMap<Ticket, CancellationToken>,
    timers: HashMap<TimerKind, AbortHandle>,
}

impl ConnectionWorker {
    pub(crate) fn new(
        session: Arc<ConnectionSession>,
        machine: ConnectionStateMachine,
        ports: ConnectionPorts,
        tx: mpsc::Sender<ControllerMessage>,
        snapshot_tx: watch::Sender<ConnectionSnapshot>,
        listeners: ProjectionListeners,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            machine,
            ports,
            tx,
            snapshot_tx,
            listeners,
            shutdown,
            operations: HashMap::new(),
            timers: HashMap::new(),
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<ControllerMessage>) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = rx.recv() => match message {
                    Some(ControllerMessage::Event(event)) => self.dispatch(event).await,
                    Some(ControllerMessage::Flush(done)) => {
                        let _ = done.send(());
                    }
                    None => break,
                },
            }
        }

        self.dispatch(ConnectionEvent::Teardown).await;
        rx.close();
        for (_, token) in self.operations.drain() {
            token.cancel();
        }
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
        tracing::debug!("connection worker stopped");
    }

    async fn dispatch(&mut self, event: ConnectionEvent) {
        let span = info_span!(
            "connection.dispatch",
            account_id = %self.session.account_id(),
            event = event.name()
        );
        async {
            let (_state, actions) = self.machine.handle_event(event, Utc::now());
            for action in actions {
                self.execute_action(action).await;
            }
            self.release_settled_operations();
        }
        .instrument(span)
        .await
    }

    /// 执行单个动作
    async fn execute_action(&mut self, action: ConnectionAction) {
        match action {
            ConnectionAction::QueryExistingSession { ticket } => {
                let remote = self.ports.remote.clone();
                let session = self.session.clone();
                self.spawn_operation(
                    ticket,
                    "query_existing_session",
                    async move {
                        let outcome = match remote.query_existing_session(session.account_id()).await
                        {
                            Ok(SessionPresence::Present) => SessionQueryOutcome::Present,
                            Ok(SessionPresence::Absent) => SessionQueryOutcome::Absent,
                            Err(err) => SessionQueryOutcome::Unknown(err.to_string()),
                        };
                        ConnectionEvent::SessionQueryResolved { ticket, outcome }
                    }
                    .boxed(),
                );
            }
            ConnectionAction::RequestPermission { ticket } => {
                let permission = self.ports.permission.clone();
                self.spawn_operation(
                    ticket,
                    "request_health_data_permission",
                    async move {
                        match permission.request_health_data_permission().await {
                            Ok(PermissionStatus::Granted) => {
                                ConnectionEvent::PermissionGranted { ticket }
                            }
                            Ok(PermissionStatus::Denied { reason }) => {
                                ConnectionEvent::PermissionDenied { ticket, reason }
                            }
                            Err(err) => ConnectionEvent::PermissionDenied {
                                ticket,
                                reason: Some(err.to_string()),
                            },
                        }
                    }
                    .boxed(),
                );
            }
            ConnectionAction::OpenSyncSession { ticket } => {
                let remote = self.ports.remote.clone();
                let session = self.session.clone();
                self.spawn_operation(
                    ticket,
                    "open_sync_session",
                    async move {
                        match remote
                            .open_sync_session(session.account_id(), session.api_key())
                            .await
                        {
                            Ok(()) => ConnectionEvent::SyncSucceeded { ticket },
                            Err(err) => ConnectionEvent::SyncFailed {
                                ticket,
                                reason: err.to_string(),
                            },
                        }
                    }
                    .boxed(),
                );
            }
            ConnectionAction::CloseSession { ticket, reason } => self.spawn_close(ticket, reason),
            ConnectionAction::AbortOperation { ticket } => {
                if let Some(token) = self.operations.remove(&ticket) {
                    tracing::debug!(%ticket, "aborting operation");
                    token.cancel();
                }
            }
            ConnectionAction::StartTimer {
                kind,
                deadline,
                fire,
            } => {
                if let Some(handle) = self.timers.remove(&kind) {
                    handle.abort();
                }
                let sleep_duration = deadline
                    .signed_duration_since(Utc::now())
                    .to_std()
                    .unwrap_or_else(|_| std::time::Duration::from_secs(0));
                let tx = self.tx.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(sleep_duration).await;
                    tracing::debug!(?kind, "connection timer fired");
                    let _ = tx.send(ControllerMessage::Event(fire)).await;
                });
                self.timers.insert(kind, handle.abort_handle());
            }
            ConnectionAction::CancelTimer { kind } => {
                if let Some(handle) = self.timers.remove(&kind) {
                    handle.abort();
                }
            }
            ConnectionAction::PublishProjection { state, projection } => {
                let snapshot = ConnectionSnapshot {
                    state,
                    projection: projection.clone(),
                };
                self.snapshot_tx.send_replace(snapshot.clone());
                self.listeners.notify(&projection);
                self.ports
                    .events
                    .emit_snapshot(self.session.account_id(), snapshot)
                    .await;
            }
            ConnectionAction::ConfirmStatus { state } => {
                self.ports
                    .events
                    .emit_status_confirmed(
                        self.session.account_id(),
                        ConnectionSnapshot::of(state),
                    )
                    .await;
            }
            ConnectionAction::Notify { error } => {
                tracing::warn!(
                    account_id = %self.session.account_id(),
                    error = %error,
                    "connection error"
                );
                self.ports
                    .events
                    .emit_error(self.session.account_id(), error)
                    .await;
            }
            ConnectionAction::Ignored { error } => {
                tracing::debug!(error = %error, "connection event ignored");
            }
            ConnectionAction::LogTransition {
                old_state,
                event,
                new_state,
            } => {
                if old_state != new_state {
                    tracing::info!(
                        account_id = %self.session.account_id(),
                        from = ?old_state,
                        to = ?new_state,
                        event = %event,
                        "connection state transition"
                    );
                } else {
                    tracing::trace!(state = ?old_state, event = %event, "connection event handled");
                }
            }
        }
    }

    /// Run a port call in its own task; the result comes back as an event.
    ///
    /// The call races a child of the shutdown token, so a cancelled or torn
    /// down operation never delivers its completion.
    fn spawn_operation(
        &mut self,
        ticket: Ticket,
        name: &'static str,
        operation: BoxFuture<'static, ConnectionEvent>,
    ) {
        let token = self.shutdown.child_token();
        self.operations.insert(ticket, token.clone());
        let tx = self.tx.clone();
        let span = info_span!("connection.operation", operation = name, %ticket);

        tokio::spawn(
            async move {
                let event = tokio::select! {
                    event = operation => event,
                    _ = token.cancelled() => {
                        tracing::debug!("operation cancelled");
                        return;
                    }
                };
                if token.is_cancelled() {
                    return;
                }
                if tx.send(ControllerMessage::Event(event)).await.is_err() {
                    tracing::debug!("connection worker gone, completion dropped");
                }
            }
            .instrument(span),
        );
    }

    /// Closing is best-effort and outlives the worker during teardown.
    ///
    /// Not tied to a cancellation token: the machine waits for the outcome
    /// before querying or opening again, so it must always report back.
    fn spawn_close(&self, ticket: Ticket, reason: CloseReason) {
        let remote = self.ports.remote.clone();
        let session = self.session.clone();
        let tx = self.tx.clone();
        let span = info_span!(
            "connection.close_session",
            account_id = %session.account_id(),
            %ticket,
            ?reason
        );

        tokio::spawn(
            async move {
                let event = match remote.close_session(session.account_id()).await {
                    Ok(()) => {
                        tracing::info!("remote session closed");
                        ConnectionEvent::SessionClosed { ticket }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "closing remote session failed");
                        ConnectionEvent::SessionCloseFailed {
                            ticket,
                            reason: err.to_string(),
                        }
                    }
                };
                if tx.send(ControllerMessage::Event(event)).await.is_err() {
                    tracing::debug!("connection worker gone, close outcome dropped");
                }
            }
            .instrument(span),
        );
    }

    /// Cancel bookkeeping for operations the machine no longer waits on.
    fn release_settled_operations(&mut self) {
        let in_flight = self.machine.in_flight_ticket();
        self.operations.retain(|ticket, token| {
            let keep = Some(*ticket) == in_flight;
            if !keep {
                token.cancel();
            }
            keep
        });
    }
}
