//! Heka application orchestration layer
//!
//! This crate drives the connection state machine from `hk-core` against the
//! permission and remote-session ports, and hosts the settings use cases.

pub mod usecases;

pub use usecases::connection::{
    ConnectionController, ConnectionPorts, ControllerConfig, ControllerError, ListenerId,
};
