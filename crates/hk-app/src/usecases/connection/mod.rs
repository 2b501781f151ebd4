//! Connection lifecycle orchestration
//!
//! 这个模块负责把挂载 / 点击事件和端口回调转换为状态机事件,
//! 并执行状态机返回的动作。
//!
//! # Architecture / 架构
//!
//! ```text
//! attach / activate / port completions / timers
//!   ↓
//! ConnectionController (bounded queue)
//!   ↓
//! ConnectionWorker (sequential, owns the state machine)
//!   ↓
//! ConnectionStateMachine (pure state transitions)
//!   ↓
//! ConnectionActions (executed by the worker)
//!   ↓
//! permission / remote session / projection side effects
//! ```

mod config;
mod controller;
mod listeners;
mod ports;
mod worker;

pub use config::ControllerConfig;
pub use controller::{ConnectionController, ControllerError};
pub use listeners::{ListenerId, ProjectionCallback};
pub use ports::ConnectionPorts;
