use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::ConnectionState;

/// Errors raised while driving the connection lifecycle.
///
/// Every variant is recoverable: none leaves the machine in an undefined state
/// and none propagates to the host as a failure. Surfaced variants reach the
/// host through the notification hook; `IllegalTransition` is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConnectionError {
    #[error("health data permission denied{}", reason_suffix(.reason))]
    PermissionDenied { reason: Option<String> },

    #[error("sync failed: {reason}")]
    SyncFailed { reason: String },

    #[error("sync session timed out after {after_secs}s")]
    SyncTimedOut { after_secs: u64 },

    #[error("remote session state unknown: {reason}")]
    SessionQueryUnknown { reason: String },

    #[error("closing remote session failed: {reason}")]
    SessionCloseFailed { reason: String },

    #[error("event `{event}` has no transition from {state:?}")]
    IllegalTransition {
        state: ConnectionState,
        event: String,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}

impl ConnectionError {
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Short hint suitable for a subtitle or toast.
    ///
    /// `None` for errors that must never reach the user.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            ConnectionError::PermissionDenied { .. } => {
                Some("Allow Health access in Settings to connect")
            }
            ConnectionError::SyncFailed { .. } | ConnectionError::SyncTimedOut { .. } => {
                Some("Sync failed, tap Connect to retry")
            }
            ConnectionError::SessionQueryUnknown { .. } => {
                Some("Couldn't check connection status")
            }
            ConnectionError::SessionCloseFailed { .. } => {
                Some("Disconnect may not have reached the server")
            }
            ConnectionError::IllegalTransition { .. } => None,
        }
    }
}
