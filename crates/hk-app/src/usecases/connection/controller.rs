use std::sync::{Arc, Mutex, PoisonError};

use hk_core::{
    AccountId, ConnectionEvent, ConnectionSession, ConnectionSnapshot, ConnectionState,
    ConnectionStateMachine, DisplayProjection,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::config::ControllerConfig;
use super::listeners::{ListenerId, ProjectionListeners};
use super::ports::ConnectionPorts;
use super::worker::{ConnectionWorker, ControllerMessage};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("connection controller must be spawned inside a tokio runtime")]
    NoRuntime,
}

/// 连接控制器
///
/// Handle to one widget's connection lifecycle. All triggers are queued and
/// processed one at a time by a single worker task, so at most one transition
/// is ever in progress. Reads are served from the latest published snapshot
/// and never wait on the worker.
///
/// Dropping the handle tears the worker down: in-flight operations and timers
/// are cancelled and a partially opened sync session is released best-effort.
pub struct ConnectionController {
    account_id: AccountId,
    tx: mpsc::Sender<ControllerMessage>,
    snapshot_rx: watch::Receiver<ConnectionSnapshot>,
    listeners: ProjectionListeners,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionController {
    /// Start the controller on the current tokio runtime in `NotConnected`.
    pub fn spawn(
        session: ConnectionSession,
        ports: ConnectionPorts,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ControllerError::NoRuntime)?;

        let account_id = session.account_id().clone();
        let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(ConnectionSnapshot::default());
        let listeners = ProjectionListeners::default();
        let shutdown = CancellationToken::new();

        let worker = ConnectionWorker::new(
            Arc::new(session),
            ConnectionStateMachine::with_policy(config.policy),
            ports,
            tx.clone(),
            snapshot_tx,
            listeners.clone(),
            shutdown.clone(),
        );
        let span = info_span!("connection.worker", account_id = %account_id);
        let handle = runtime.spawn(worker.run(rx).instrument(span));

        tracing::debug!(
            account_id = %account_id,
            queue_capacity = config.event_queue_capacity,
            "connection controller started"
        );

        Ok(Self {
            account_id,
            tx,
            snapshot_rx,
            listeners,
            shutdown,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Owning view attached to a screen; refreshes the status from the remote service.
    pub fn attach(&self) {
        self.enqueue(ConnectionEvent::Attached);
    }

    /// The single action button was tapped. Its meaning depends on the state
    /// at processing time, so the caller never inspects the state first.
    pub fn handle_activate(&self) {
        self.enqueue(ConnectionEvent::Activate);
    }

    fn enqueue(&self, event: ConnectionEvent) {
        if self.shutdown.is_cancelled() {
            tracing::debug!(event = event.name(), "controller shut down, trigger dropped");
            return;
        }
        match self.tx.try_send(ControllerMessage::Event(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(ControllerMessage::Event(event))) => {
                tracing::warn!(
                    account_id = %self.account_id,
                    event = event.name(),
                    "connection queue full, trigger dropped"
                );
            }
            Err(err) => {
                tracing::debug!(error = %err, "connection worker gone, trigger dropped");
            }
        }
    }

    pub fn current_projection(&self) -> DisplayProjection {
        self.snapshot_rx.borrow().projection.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().state
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Register a callback run on the worker right after each state change.
    ///
    /// Callbacks must not block; they run before the next event is processed.
    pub fn on_projection_changed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&DisplayProjection) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(callback))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Resolves once every trigger queued before this call has been processed.
    ///
    /// Completions of asynchronous operations that are still running are not
    /// waited for. Returns immediately after shutdown.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(ControllerMessage::Flush(done_tx)).await.is_err() {
            return;
        }
        tokio::select! {
            _ = done_rx => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    /// Tear the controller down and wait for the worker to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "connection worker ended abnormally");
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionController")
            .field("account_id", &self.account_id)
            .field("state", &self.current_state())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
