use serde::{Deserialize, Serialize};

/// Connection lifecycle state.
///
/// 连接生命周期状态。恰好三个成员，同一时刻只有一个处于激活状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No remote session is bound to the account.
    ///
    /// 未连接。
    #[default]
    NotConnected,
    /// Permission granted and a sync session is running.
    ///
    /// 同步中，按钮不可交互。
    Syncing,
    /// A remote session exists for the account.
    ///
    /// 已连接。
    Connected,
}

impl ConnectionState {
    /// Button title shown for this state.
    pub fn button_title(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "Connect",
            ConnectionState::Syncing => "Syncing…",
            ConnectionState::Connected => "Disconnect",
        }
    }

    /// Whether a tap on the button means anything in this state.
    pub fn accepts_activation(&self) -> bool {
        !matches!(self, ConnectionState::Syncing)
    }

    pub fn projection(&self) -> DisplayProjection {
        DisplayProjection {
            button_label: self.button_title().to_string(),
            button_enabled_for_action: self.accepts_activation(),
        }
    }
}

/// Read-only, view-facing summary derived from [`ConnectionState`] alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayProjection {
    pub button_label: String,
    pub button_enabled_for_action: bool,
}

impl From<ConnectionState> for DisplayProjection {
    fn from(state: ConnectionState) -> Self {
        state.projection()
    }
}

impl Default for DisplayProjection {
    fn default() -> Self {
        ConnectionState::default().projection()
    }
}

/// State plus its projection, published after every processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub projection: DisplayProjection,
}

impl ConnectionSnapshot {
    pub fn of(state: ConnectionState) -> Self {
        Self {
            state,
            projection: state.projection(),
        }
    }
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self::of(ConnectionState::default())
    }
}
