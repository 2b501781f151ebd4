use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hk_app::{ConnectionController, ConnectionPorts, ControllerConfig};
use hk_core::ports::{
    ConnectionEventPort, HealthPermissionError, HealthPermissionPort, PermissionStatus,
    RemoteSessionError, RemoteSessionPort, SessionPresence,
};
use hk_core::settings::model::Settings;
use hk_core::{
    AccountId, ApiKey, ConnectionError, ConnectionSession, ConnectionSnapshot, ConnectionState,
};
use hk_infra::permission::FixedHealthPermission;
use hk_infra::remote::InMemoryRemoteSessionService;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Port doubles
// ---------------------------------------------------------------------------

struct ScriptedPermission {
    responses: Mutex<VecDeque<Result<PermissionStatus, HealthPermissionError>>>,
    calls: AtomicUsize,
}

impl ScriptedPermission {
    fn granting() -> Arc<Self> {
        Self::with(Vec::new())
    }

    fn with(responses: Vec<Result<PermissionStatus, HealthPermissionError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthPermissionPort for ScriptedPermission {
    async fn request_health_data_permission(
        &self,
    ) -> Result<PermissionStatus, HealthPermissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PermissionStatus::Granted))
    }
}

struct ScriptedRemote {
    queries: Mutex<VecDeque<Result<SessionPresence, RemoteSessionError>>>,
    sync_result: Mutex<Result<(), RemoteSessionError>>,
    close_result: Mutex<Result<(), RemoteSessionError>>,
    /// When set, `open_sync_session` waits for a permit before returning.
    sync_gate: Option<Arc<Notify>>,
    query_calls: AtomicUsize,
    sync_calls: AtomicUsize,
    close_calls: AtomicUsize,
    closed: Notify,
}

impl ScriptedRemote {
    fn new() -> Self {
        Self {
            queries: Mutex::new(VecDeque::new()),
            sync_result: Mutex::new(Ok(())),
            close_result: Mutex::new(Ok(())),
            sync_gate: None,
            query_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            closed: Notify::new(),
        }
    }

    fn with_queries(self, queries: Vec<Result<SessionPresence, RemoteSessionError>>) -> Self {
        *self.queries.lock().unwrap() = queries.into();
        self
    }

    fn with_sync_result(self, result: Result<(), RemoteSessionError>) -> Self {
        *self.sync_result.lock().unwrap() = result;
        self
    }

    fn with_close_result(self, result: Result<(), RemoteSessionError>) -> Self {
        *self.close_result.lock().unwrap() = result;
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.sync_gate = Some(gate);
        self
    }

    fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    async fn wait_closed(&self) {
        tokio::time::timeout(Duration::from_secs(300), async {
            while self.close_calls() == 0 {
                self.closed.notified().await;
            }
        })
        .await
        .expect("close_session was never called");
    }
}

#[async_trait]
impl RemoteSessionPort for ScriptedRemote {
    async fn query_existing_session(
        &self,
        _account_id: &AccountId,
    ) -> Result<SessionPresence, RemoteSessionError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SessionPresence::Absent))
    }

    async fn open_sync_session(
        &self,
        _account_id: &AccountId,
        _api_key: &ApiKey,
    ) -> Result<(), RemoteSessionError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.sync_gate {
            gate.notified().await;
        }
        self.sync_result.lock().unwrap().clone()
    }

    async fn close_session(&self, _account_id: &AccountId) -> Result<(), RemoteSessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.notify_waiters();
        self.close_result.lock().unwrap().clone()
    }
}

/// Remote that keeps real session state and holds `close_session` until released.
struct SlowCloseRemote {
    present: Mutex<bool>,
    sync_failures: Mutex<VecDeque<RemoteSessionError>>,
    close_gate: Notify,
    query_calls: AtomicUsize,
    sync_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl SlowCloseRemote {
    fn new(present: bool) -> Self {
        Self {
            present: Mutex::new(present),
            sync_failures: Mutex::new(VecDeque::new()),
            close_gate: Notify::new(),
            query_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn failing_first_sync(self, error: RemoteSessionError) -> Self {
        self.sync_failures.lock().unwrap().push_back(error);
        self
    }

    fn release_close(&self) {
        self.close_gate.notify_one();
    }

    fn is_present(&self) -> bool {
        *self.present.lock().unwrap()
    }
}

#[async_trait]
impl RemoteSessionPort for SlowCloseRemote {
    async fn query_existing_session(
        &self,
        _account_id: &AccountId,
    ) -> Result<SessionPresence, RemoteSessionError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(if self.is_present() {
            SessionPresence::Present
        } else {
            SessionPresence::Absent
        })
    }

    async fn open_sync_session(
        &self,
        _account_id: &AccountId,
        _api_key: &ApiKey,
    ) -> Result<(), RemoteSessionError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        // A failed sync still leaves a partial session behind.
        *self.present.lock().unwrap() = true;
        match self.sync_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn close_session(&self, _account_id: &AccountId) -> Result<(), RemoteSessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.close_gate.notified().await;
        *self.present.lock().unwrap() = false;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingEvents {
    snapshots: Mutex<Vec<ConnectionSnapshot>>,
    errors: Mutex<Vec<ConnectionError>>,
}

impl RecordingEvents {
    fn errors(&self) -> Vec<ConnectionError> {
        self.errors.lock().unwrap().clone()
    }

    fn states(&self) -> Vec<ConnectionState> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|snapshot| snapshot.state)
            .collect()
    }
}

#[async_trait]
impl ConnectionEventPort for RecordingEvents {
    async fn emit_snapshot(&self, _account_id: &AccountId, snapshot: ConnectionSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }

    async fn emit_error(&self, _account_id: &AccountId, error: ConnectionError) {
        self.errors.lock().unwrap().push(error);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session() -> ConnectionSession {
    ConnectionSession::new("abc-123", "k1").expect("valid session")
}

fn spawn(
    permission: Arc<dyn HealthPermissionPort>,
    remote: Arc<dyn RemoteSessionPort>,
    events: Arc<RecordingEvents>,
    config: ControllerConfig,
) -> ConnectionController {
    ConnectionController::spawn(
        session(),
        ConnectionPorts::new(permission, remote, events),
        config,
    )
    .expect("inside runtime")
}

async fn wait_for_state(controller: &ConnectionController, state: ConnectionState) {
    let mut rx = controller.subscribe();
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"))
        .expect("worker alive");
}

/// Let spawned port calls finish and their completions be processed.
async fn settle(controller: &ConnectionController) {
    for _ in 0..3 {
        controller.flush().await;
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
    controller.flush().await;
}

fn config_with(f: impl FnOnce(&mut Settings)) -> ControllerConfig {
    let mut settings = Settings::default();
    f(&mut settings);
    ControllerConfig::from_settings(&settings)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn starts_not_connected_with_connect_button() {
    let controller = spawn(
        ScriptedPermission::granting(),
        Arc::new(ScriptedRemote::new()),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
    let projection = controller.current_projection();
    assert_eq!(projection.button_label, "Connect");
    assert!(projection.button_enabled_for_action);
}

#[tokio::test]
async fn full_connect_and_disconnect_scenario() {
    let gate = Arc::new(Notify::new());
    let permission = ScriptedPermission::granting();
    let remote = Arc::new(ScriptedRemote::new().gated(gate.clone()));
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        events.clone(),
        ControllerConfig::default(),
    );

    let labels = Arc::new(Mutex::new(Vec::new()));
    let seen = labels.clone();
    controller.on_projection_changed(move |projection| {
        seen.lock()
            .unwrap()
            .push((projection.button_label.clone(), projection.button_enabled_for_action));
    });

    // Attach: no remote session.
    controller.attach();
    settle(&controller).await;
    assert_eq!(remote.query_calls(), 1);
    assert_eq!(controller.current_projection().button_label, "Connect");

    // Connect: permission granted, sync running.
    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::Syncing).await;
    let projection = controller.current_projection();
    assert_eq!(projection.button_label, "Syncing…");
    assert!(!projection.button_enabled_for_action);

    // Sync completes.
    gate.notify_one();
    wait_for_state(&controller, ConnectionState::Connected).await;
    let projection = controller.current_projection();
    assert_eq!(projection.button_label, "Disconnect");
    assert!(projection.button_enabled_for_action);

    assert_eq!(permission.calls(), 1);
    assert_eq!(remote.sync_calls(), 1);
    assert_eq!(remote.close_calls(), 0);

    // Disconnect.
    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::NotConnected).await;
    remote.wait_closed().await;
    settle(&controller).await;
    assert_eq!(remote.close_calls(), 1);
    assert_eq!(controller.current_projection().button_label, "Connect");

    assert_eq!(
        *labels.lock().unwrap(),
        vec![
            ("Syncing…".to_string(), false),
            ("Disconnect".to_string(), true),
            ("Connect".to_string(), true),
        ]
    );
    assert_eq!(
        events.states(),
        vec![
            ConnectionState::Syncing,
            ConnectionState::Connected,
            ConnectionState::NotConnected,
        ]
    );
    assert!(events.errors().is_empty());
}

#[tokio::test]
async fn attach_with_existing_session_connects() {
    let remote = Arc::new(ScriptedRemote::new().with_queries(vec![Ok(SessionPresence::Present)]));
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    controller.attach();
    wait_for_state(&controller, ConnectionState::Connected).await;
    assert_eq!(controller.current_projection().button_label, "Disconnect");
}

#[tokio::test]
async fn activate_while_syncing_calls_no_collaborator() {
    let gate = Arc::new(Notify::new());
    let permission = ScriptedPermission::granting();
    let remote = Arc::new(ScriptedRemote::new().gated(gate.clone()));
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::Syncing).await;
    let before = controller.current_projection();

    controller.handle_activate();
    controller.handle_activate();
    settle(&controller).await;

    assert_eq!(controller.current_projection(), before);
    assert_eq!(controller.current_state(), ConnectionState::Syncing);
    assert_eq!(permission.calls(), 1);
    assert_eq!(remote.sync_calls(), 1);
    assert_eq!(remote.close_calls(), 0);

    gate.notify_one();
    wait_for_state(&controller, ConnectionState::Connected).await;
}

#[tokio::test]
async fn repeated_permission_denial_stays_not_connected() {
    let permission = ScriptedPermission::with(vec![
        Ok(PermissionStatus::Denied { reason: None }),
        Ok(PermissionStatus::Denied {
            reason: Some("user declined".to_string()),
        }),
        Err(HealthPermissionError::Unavailable),
    ]);
    let remote = Arc::new(ScriptedRemote::new());
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        events.clone(),
        ControllerConfig::default(),
    );

    for _ in 0..3 {
        controller.handle_activate();
        settle(&controller).await;
        assert_eq!(controller.current_state(), ConnectionState::NotConnected);
    }

    assert_eq!(permission.calls(), 3);
    assert_eq!(remote.sync_calls(), 0);
    assert!(events.states().is_empty(), "no state change should be published");
    assert_eq!(
        events.errors(),
        vec![
            ConnectionError::PermissionDenied { reason: None },
            ConnectionError::PermissionDenied {
                reason: Some("user declined".to_string())
            },
            ConnectionError::PermissionDenied {
                reason: Some("health data is not available on this device".to_string())
            },
        ]
    );
}

#[tokio::test]
async fn sync_failure_releases_session_and_allows_retry() {
    let remote = Arc::new(
        ScriptedRemote::new().with_sync_result(Err(RemoteSessionError::Service("503".to_string()))),
    );
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        events.clone(),
        ControllerConfig::default(),
    );

    controller.handle_activate();
    remote.wait_closed().await;
    settle(&controller).await;

    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
    assert_eq!(
        events.states(),
        vec![ConnectionState::Syncing, ConnectionState::NotConnected]
    );
    assert_eq!(remote.close_calls(), 1);
    assert_eq!(
        events.errors(),
        vec![ConnectionError::SyncFailed {
            reason: "remote service error: 503".to_string()
        }]
    );

    *remote.sync_result.lock().unwrap() = Ok(());
    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::Connected).await;
}

#[tokio::test]
async fn close_failure_is_reported_and_state_stays_not_connected() {
    let remote = Arc::new(
        ScriptedRemote::new()
            .with_queries(vec![Ok(SessionPresence::Present)])
            .with_close_result(Err(RemoteSessionError::Transport("offline".to_string()))),
    );
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        events.clone(),
        ControllerConfig::default(),
    );

    controller.attach();
    wait_for_state(&controller, ConnectionState::Connected).await;
    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::NotConnected).await;
    remote.wait_closed().await;
    settle(&controller).await;

    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
    assert_eq!(
        events.errors(),
        vec![ConnectionError::SessionCloseFailed {
            reason: "transport failure: offline".to_string()
        }]
    );
}

#[tokio::test]
async fn attach_during_slow_disconnect_reports_the_closed_session() {
    let remote = Arc::new(SlowCloseRemote::new(true));
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    controller.attach();
    wait_for_state(&controller, ConnectionState::Connected).await;

    controller.handle_activate();
    controller.flush().await;
    assert_eq!(controller.current_state(), ConnectionState::NotConnected);

    // The remote still holds the session; nothing may ask about it yet.
    controller.attach();
    settle(&controller).await;
    assert_eq!(remote.query_calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.current_state(), ConnectionState::NotConnected);

    remote.release_close();
    tokio::time::sleep(Duration::from_millis(20)).await;
    settle(&controller).await;

    assert!(!remote.is_present());
    assert_eq!(remote.query_calls.load(Ordering::SeqCst), 2);
    assert_eq!(remote.close_calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
    assert_eq!(controller.current_projection().button_label, "Connect");
}

#[tokio::test]
async fn reconnect_waits_for_partial_session_release() {
    let permission = ScriptedPermission::granting();
    let remote = Arc::new(
        SlowCloseRemote::new(false)
            .failing_first_sync(RemoteSessionError::Service("503".to_string())),
    );
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        events.clone(),
        ControllerConfig::default(),
    );

    controller.handle_activate();
    settle(&controller).await;
    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
    assert_eq!(remote.close_calls.load(Ordering::SeqCst), 1);

    // Tapped again while the partial session is still being released.
    controller.handle_activate();
    settle(&controller).await;
    assert_eq!(permission.calls(), 1);
    assert_eq!(remote.sync_calls.load(Ordering::SeqCst), 1);

    remote.release_close();
    wait_for_state(&controller, ConnectionState::Connected).await;

    // The late release did not remove the new session.
    assert!(remote.is_present());
    assert_eq!(permission.calls(), 2);
    assert_eq!(remote.sync_calls.load(Ordering::SeqCst), 2);
    assert_eq!(remote.close_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        events.states(),
        vec![
            ConnectionState::Syncing,
            ConnectionState::NotConnected,
            ConnectionState::Syncing,
            ConnectionState::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn sync_deadline_fails_the_sync_and_drops_late_completion() {
    let gate = Arc::new(Notify::new());
    let remote = Arc::new(ScriptedRemote::new().gated(gate.clone()));
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        events.clone(),
        config_with(|s| s.connection.sync_timeout_secs = 30),
    );

    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::Syncing).await;
    wait_for_state(&controller, ConnectionState::NotConnected).await;
    remote.wait_closed().await;
    settle(&controller).await;

    assert_eq!(
        events.errors(),
        vec![ConnectionError::SyncTimedOut { after_secs: 30 }]
    );
    assert_eq!(remote.close_calls(), 1);

    // The aborted transfer finishing late must not reconnect.
    gate.notify_one();
    settle(&controller).await;
    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
}

#[tokio::test(start_paused = true)]
async fn inconclusive_refresh_is_retried_with_backoff() {
    let remote = Arc::new(ScriptedRemote::new().with_queries(vec![
        Err(RemoteSessionError::Transport("timeout".to_string())),
        Err(RemoteSessionError::Transport("timeout".to_string())),
        Ok(SessionPresence::Present),
    ]));
    let events = Arc::new(RecordingEvents::default());
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        events.clone(),
        ControllerConfig::default(),
    );

    let started = tokio::time::Instant::now();
    controller.attach();
    wait_for_state(&controller, ConnectionState::Connected).await;

    assert_eq!(remote.query_calls(), 3);
    // 2s + 4s of backoff
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        events.errors(),
        vec![
            ConnectionError::SessionQueryUnknown {
                reason: "transport failure: timeout".to_string()
            };
            2
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_retries_are_bounded() {
    let remote = Arc::new(ScriptedRemote::new().with_queries(vec![
        Err(RemoteSessionError::Transport("down".to_string()));
        10
    ]));
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        config_with(|s| s.connection.refresh_retry.max_attempts = 2),
    );

    controller.attach();
    tokio::time::sleep(Duration::from_secs(600)).await;
    settle(&controller).await;

    assert_eq!(remote.query_calls(), 3);
    assert_eq!(controller.current_state(), ConnectionState::NotConnected);
}

#[tokio::test]
async fn shutdown_mid_sync_releases_session_and_stops_processing() {
    let gate = Arc::new(Notify::new());
    let permission = ScriptedPermission::granting();
    let remote = Arc::new(ScriptedRemote::new().gated(gate.clone()));
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::Syncing).await;

    controller.shutdown().await;
    remote.wait_closed().await;
    assert!(controller.is_shut_down());
    assert_eq!(remote.close_calls(), 1);

    // Late completion and new triggers go nowhere.
    gate.notify_one();
    controller.handle_activate();
    controller.flush().await;
    tokio::task::yield_now().await;
    assert_eq!(permission.calls(), 1);
    assert_eq!(controller.current_state(), ConnectionState::Syncing);
}

#[tokio::test]
async fn dropping_controller_cancels_pending_permission_prompt() {
    let remote = Arc::new(ScriptedRemote::new());
    let permission = Arc::new(FixedHealthPermission::granted().with_delay(Duration::from_millis(50)));
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    controller.handle_activate();
    settle(&controller).await;
    drop(controller);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(remote.sync_calls(), 0);
    assert_eq!(remote.close_calls(), 0);
}

#[tokio::test]
async fn full_queue_drops_triggers() {
    let permission = ScriptedPermission::granting();
    let remote = Arc::new(ScriptedRemote::new());
    let controller = spawn(
        permission.clone(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        config_with(|s| s.connection.event_queue_capacity = 1),
    );

    // The worker cannot run before this task yields, so the second trigger
    // finds the queue full.
    controller.attach();
    controller.handle_activate();
    settle(&controller).await;

    assert_eq!(remote.query_calls(), 1);
    assert_eq!(permission.calls(), 0);
}

#[tokio::test]
async fn removed_listener_stops_receiving_projections() {
    let remote = Arc::new(ScriptedRemote::new().with_queries(vec![Ok(SessionPresence::Present)]));
    let controller = spawn(
        ScriptedPermission::granting(),
        remote.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = controller.on_projection_changed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    controller.attach();
    wait_for_state(&controller, ConnectionState::Connected).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(controller.remove_listener(id));
    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::NotConnected).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn controllers_sharing_credentials_are_independent() {
    let service = Arc::new(InMemoryRemoteSessionService::new());
    service.register_account("abc-123", "k1");
    let permission: Arc<dyn HealthPermissionPort> = Arc::new(FixedHealthPermission::granted());

    let first = spawn(
        permission.clone(),
        service.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );
    let second = spawn(
        permission.clone(),
        service.clone(),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    first.attach();
    second.attach();
    settle(&first).await;
    settle(&second).await;
    assert_eq!(first.current_state(), ConnectionState::NotConnected);
    assert_eq!(second.current_state(), ConnectionState::NotConnected);

    first.handle_activate();
    wait_for_state(&first, ConnectionState::Connected).await;
    settle(&second).await;
    assert_eq!(second.current_state(), ConnectionState::NotConnected);

    // The second widget picks the session up on its next attach.
    second.attach();
    wait_for_state(&second, ConnectionState::Connected).await;
}

#[test]
fn spawn_outside_runtime_is_rejected() {
    let result = std::thread::spawn(|| {
        ConnectionController::spawn(
            session(),
            ConnectionPorts::new(
                ScriptedPermission::granting(),
                Arc::new(ScriptedRemote::new()),
                Arc::new(RecordingEvents::default()),
            ),
            ControllerConfig::default(),
        )
        .is_err()
    })
    .join()
    .unwrap();

    assert!(result);
}

// ---------------------------------------------------------------------------
// mockall: strict call expectations on the remote service
// ---------------------------------------------------------------------------

mockall::mock! {
    pub Remote {}

    #[async_trait]
    impl RemoteSessionPort for Remote {
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

#[tokio::test]
async fn happy_path_passes_credentials_and_never_closes() {
    let mut remote = MockRemote::new();
    remote
        .expect_query_existing_session()
        .withf(|account| account.as_str() == "abc-123")
        .times(1)
        .returning(|_| Ok(SessionPresence::Absent));
    remote
        .expect_open_sync_session()
        .withf(|account, key| account.as_str() == "abc-123" && key.expose() == "k1")
        .times(1)
        .returning(|_, _| Ok(()));
    remote.expect_close_session().never();

    let permission = ScriptedPermission::granting();
    let controller = spawn(
        permission.clone(),
        Arc::new(remote),
        Arc::new(RecordingEvents::default()),
        ControllerConfig::default(),
    );

    controller.attach();
    settle(&controller).await;
    controller.handle_activate();
    wait_for_state(&controller, ConnectionState::Connected).await;

    assert_eq!(permission.calls(), 1);
    controller.shutdown().await;
}
