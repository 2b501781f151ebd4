//! # hk-infra
//!
//! Adapters implementing the `hk-core` ports: TOML settings on disk, an
//! in-process remote session service, a fixed-answer permission prompt and a
//! tracing-backed notification sink.

pub mod events;
pub mod permission;
pub mod remote;
pub mod settings;

pub use events::TracingConnectionEvents;
pub use permission::FixedHealthPermission;
pub use remote::InMemoryRemoteSessionService;
pub use settings::FileSettingsRepository;
