//! Port interfaces for the application layer
//!
//! Ports define the contract between the connection controller and the
//! platform or network adapters that actually talk to HealthKit and the
//! remote health-data service. The controller never depends on a concrete
//! adapter.

pub mod connection_event;
pub mod health_permission;
pub mod remote_session;
pub mod settings;

pub use connection_event::ConnectionEventPort;
pub use health_permission::{HealthPermissionError, HealthPermissionPort, PermissionStatus};
pub use remote_session::{RemoteSessionError, RemoteSessionPort, SessionPresence};
pub use settings::SettingsPort;
