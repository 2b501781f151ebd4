pub mod config;
pub mod tracing;
pub mod wiring;

pub use config::{load_settings, resolve_settings_path, save_settings};
pub use wiring::{in_process_ports, wire_ports};
