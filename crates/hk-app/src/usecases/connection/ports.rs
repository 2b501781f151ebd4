use std::sync::Arc;

use hk_core::ports::{ConnectionEventPort, HealthPermissionPort, RemoteSessionPort};

/// Collaborators the controller drives.
#[derive(Clone)]
pub struct ConnectionPorts {
    pub permission: Arc<dyn HealthPermissionPort>,
    pub remote: Arc<dyn RemoteSessionPort>,
    /// Host notification hook.
    pub events: Arc<dyn ConnectionEventPort>,
}

impl ConnectionPorts {
    pub fn new(
        permission: Arc<dyn HealthPermissionPort>,
        remote: Arc<dyn RemoteSessionPort>,
        events: Arc<dyn ConnectionEventPort>,
    ) -> Self {
        Self {
            permission,
            remote,
            events,
        }
    }
}
