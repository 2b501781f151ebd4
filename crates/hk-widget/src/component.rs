//! HealthKit connection card
//!
//! 组件本身不做任何状态判断:挂载和点击直接转发给控制器,
//! 渲染只读取控制器发布的投影。

use std::sync::Arc;

use hk_app::{ConnectionController, ConnectionPorts, ControllerConfig, ControllerError};
use hk_core::settings::model::Settings;
use hk_core::{AccountId, ApiKey, ConnectionSession, ConnectionState, SessionError};
use thiserror::Error;

use crate::events::WidgetEventSink;
use crate::view::ComponentView;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("invalid session: {0}")]
    InvalidSession(#[from] SessionError),

    #[error(transparent)]
    Runtime(#[from] ControllerError),
}

/// The "Apple HealthKit" card with its single Connect / Disconnect button.
pub struct HekaComponent {
    controller: ConnectionController,
    sink: Arc<WidgetEventSink>,
}

impl HekaComponent {
    /// Build the card for one account.
    ///
    /// `ports.events` is the host's notification hook; the card wraps it to
    /// track the subtitle hint. Must be called inside a tokio runtime.
    pub fn new(
        uuid: impl Into<AccountId>,
        api_key: impl Into<ApiKey>,
        ports: ConnectionPorts,
        settings: &Settings,
    ) -> Result<Self, ComponentError> {
        let session = ConnectionSession::new(uuid, api_key)?;
        let sink = Arc::new(WidgetEventSink::new(ports.events.clone()));
        let ports = ConnectionPorts {
            events: sink.clone(),
            ..ports
        };

        let controller =
            ConnectionController::spawn(session, ports, ControllerConfig::from_settings(settings))?;

        Ok(Self { controller, sink })
    }

    /// View attached to a window.
    pub fn did_move_to_superview(&self) {
        self.controller.attach();
    }

    pub fn button_tapped(&self) {
        self.controller.handle_activate();
    }

    pub fn render(&self) -> ComponentView {
        ComponentView::compose(&self.controller.current_projection(), self.sink.hint())
    }

    /// Called with a fresh view after every state change or new hint.
    pub fn on_render<F>(&self, callback: F)
    where
        F: Fn(&ComponentView) + Send + Sync + 'static,
    {
        self.sink.add_renderer(Arc::new(callback));
    }

    pub fn view_model(&self) -> ConnectionViewModel<'_> {
        ConnectionViewModel {
            controller: &self.controller,
        }
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    /// Removed from screen for good.
    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
    }
}

/// Read-only accessors mirroring the card's bindings.
pub struct ConnectionViewModel<'a> {
    controller: &'a ConnectionController,
}

impl ConnectionViewModel<'_> {
    pub fn button_title(&self) -> String {
        self.controller.current_projection().button_label
    }

    pub fn current_connection_state(&self) -> ConnectionState {
        self.controller.current_state()
    }
}
