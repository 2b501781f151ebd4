//! Connection domain module.
//!
//! This module defines the connection lifecycle state machine types.

pub mod action;
pub mod error;
pub mod event;
pub mod policy;
pub mod state;
pub mod state_machine;

pub use action::{CloseReason, ConnectionAction, TimerKind};
pub use error::ConnectionError;
pub use event::{ConnectionEvent, SessionQueryOutcome, Ticket};
pub use policy::{ConnectionPolicy, RefreshRetryPolicy};
pub use state::{ConnectionSnapshot, ConnectionState, DisplayProjection};
pub use state_machine::ConnectionStateMachine;
