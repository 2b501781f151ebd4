//! # hk-core
//!
//! Core domain models and business logic for the Heka HealthKit widget.
//!
//! This crate contains pure business logic without any infrastructure dependencies:
//! the connection session, the three-state connection machine and the ports the
//! application layer drives.

pub mod connection;
pub mod ids;
pub mod ports;
pub mod security;
pub mod session;
pub mod settings;

// Re-export commonly used types at the crate root
pub use connection::{
    ConnectionAction, ConnectionError, ConnectionEvent, ConnectionPolicy, ConnectionSnapshot,
    ConnectionState, ConnectionStateMachine, DisplayProjection, Ticket,
};
pub use ids::AccountId;
pub use security::ApiKey;
pub use session::{ConnectionSession, SessionError};
pub use settings::model::Settings;
