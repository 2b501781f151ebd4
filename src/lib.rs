//! Heka HealthKit connection card
//!
//! 一个只有一个按钮的 HealthKit 连接卡片:
//! 未连接 → 同步中 → 已连接,按钮含义由当前状态决定。
//!
//! Re-exports the layers most hosts need and offers [`build_component`] for
//! the common "load settings, then create the card" path.

use std::path::PathBuf;

pub use hk_app::{ConnectionController, ConnectionPorts, ControllerConfig, ListenerId};
pub use hk_core::ports::{
    ConnectionEventPort, HealthPermissionError, HealthPermissionPort, PermissionStatus,
    RemoteSessionError, RemoteSessionPort, SessionPresence,
};
pub use hk_core::settings::model::Settings;
pub use hk_core::{
    AccountId, ApiKey, ConnectionError, ConnectionSnapshot, ConnectionState, DisplayProjection,
};
pub use hk_widget::bootstrap;
pub use hk_widget::{ComponentError, ComponentView, ConnectionViewModel, HekaComponent};

/// Load settings (explicit path or platform default) and create the card.
pub async fn build_component(
    uuid: &str,
    api_key: &str,
    ports: ConnectionPorts,
    settings_path: Option<PathBuf>,
) -> anyhow::Result<HekaComponent> {
    let settings = bootstrap::load_settings(settings_path).await?;
    let component = HekaComponent::new(uuid, api_key, ports, &settings)?;
    Ok(component)
}
