//! # Dependency wiring / 依赖注入
//!
//! Assembles `ConnectionPorts` from concrete adapters. No decisions are made
//! here; hosts with a real HealthKit bridge pass their own adapters to
//! [`wire_ports`].

use std::sync::Arc;

use hk_app::ConnectionPorts;
use hk_core::ports::{ConnectionEventPort, HealthPermissionPort, RemoteSessionPort};
use hk_infra::{FixedHealthPermission, InMemoryRemoteSessionService, TracingConnectionEvents};

/// Ports from host adapters; without a host hook, events are only logged.
pub fn wire_ports(
    permission: Arc<dyn HealthPermissionPort>,
    remote: Arc<dyn RemoteSessionPort>,
    host_events: Option<Arc<dyn ConnectionEventPort>>,
) -> ConnectionPorts {
    let events = host_events.unwrap_or_else(|| Arc::new(TracingConnectionEvents));
    ConnectionPorts::new(permission, remote, events)
}

/// Fully in-process ports, for demos and tests.
pub fn in_process_ports(
    permission: Arc<FixedHealthPermission>,
    service: Arc<InMemoryRemoteSessionService>,
) -> ConnectionPorts {
    wire_ports(permission, service, None)
}
