use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use hk_core::ports::ConnectionEventPort;
use hk_core::{AccountId, ConnectionError, ConnectionSnapshot, ConnectionState};

use crate::view::ComponentView;

pub type RenderCallback = Arc<dyn Fn(&ComponentView) + Send + Sync>;

#[derive(Default)]
struct SinkState {
    snapshot: ConnectionSnapshot,
    /// Error behind the subtitle, if any.
    failure: Option<ConnectionError>,
    renderers: Vec<RenderCallback>,
}

impl SinkState {
    fn hint(&self) -> Option<String> {
        self.failure
            .as_ref()
            .and_then(ConnectionError::user_hint)
            .map(str::to_string)
    }
}

/// 组件事件接收器
///
/// Sits between the controller and the host's notification hook: keeps the
/// subtitle hint, re-renders registered views and forwards every event.
pub struct WidgetEventSink {
    host: Arc<dyn ConnectionEventPort>,
    state: Mutex<SinkState>,
}

impl WidgetEventSink {
    pub fn new(host: Arc<dyn ConnectionEventPort>) -> Self {
        Self {
            host,
            state: Mutex::new(SinkState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn hint(&self) -> Option<String> {
        self.state().hint()
    }

    pub fn add_renderer(&self, renderer: RenderCallback) {
        self.state().renderers.push(renderer);
    }

    /// Build the current view and hand it to every renderer, outside the lock.
    fn render(&self) {
        let (view, renderers) = {
            let state = self.state();
            (
                ComponentView::compose(&state.snapshot.projection, state.hint()),
                state.renderers.clone(),
            )
        };
        for renderer in renderers {
            renderer(&view);
        }
    }
}

#[async_trait]
impl ConnectionEventPort for WidgetEventSink {
    async fn emit_snapshot(&self, account_id: &AccountId, snapshot: ConnectionSnapshot) {
        {
            let mut state = self.state();
            // Hints describe a failed attempt; progress makes them stale.
            if snapshot.state != ConnectionState::NotConnected {
                state.failure = None;
            }
            state.snapshot = snapshot.clone();
        }
        self.render();
        self.host.emit_snapshot(account_id, snapshot).await;
    }

    async fn emit_error(&self, account_id: &AccountId, error: ConnectionError) {
        let changed = match error.user_hint() {
            Some(hint) => {
                let mut state = self.state();
                let changed = state.hint().as_deref() != Some(hint);
                state.failure = Some(error.clone());
                changed
            }
            None => false,
        };
        if changed {
            self.render();
        }
        self.host.emit_error(account_id, error).await;
    }

    async fn emit_status_confirmed(&self, account_id: &AccountId, snapshot: ConnectionSnapshot) {
        let cleared = {
            let mut state = self.state();
            // Only the "couldn't check" hint is answered by a conclusive query.
            let stale = matches!(
                state.failure,
                Some(ConnectionError::SessionQueryUnknown { .. })
            );
            if stale {
                state.failure = None;
                state.snapshot = snapshot.clone();
            }
            stale
        };
        if cleared {
            self.render();
        }
        self.host.emit_status_confirmed(account_id, snapshot).await;
    }
}
