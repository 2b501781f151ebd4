//! Business logic use cases
//! 是否是独立 Use Case，
//! 取决于“是否需要用户 / 系统再次做出决策”
//!
//! [HekaComponent]
//         ↓
// ConnectionController  → 按钮 / 挂载事件
//         ↓
// ---------------------------------
//         ↓
// UpdateSettings → 校验并保存配置

pub mod connection;
pub mod update_settings;

pub use update_settings::UpdateSettings;
