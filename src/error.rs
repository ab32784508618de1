//! Error types for the session flow and the background task callback.

use crate::host::HostError;

/// Text shown to the user when location permission is refused.
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission to access location was denied";

/// Text shown when no position fix could be obtained.
pub const POSITION_UNAVAILABLE_MESSAGE: &str = "Current location is unavailable";

/// Failures of the foreground initialization flow.
///
/// Each one halts initialization; none of them is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Foreground location permission was not granted.
    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,

    /// Position fetch failed or never completed.
    #[error("position unavailable: {0}")]
    PositionUnavailable(HostError),

    /// The host refused the geofence registration.
    #[error("geofence registration failed: {0}")]
    Registration(HostError),
}

impl SessionError {
    /// Message for the view, if this error is user-visible
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            SessionError::PermissionDenied => Some(PERMISSION_DENIED_MESSAGE),
            SessionError::PositionUnavailable(_) => Some(POSITION_UNAVAILABLE_MESSAGE),
            SessionError::Registration(_) => None,
        }
    }
}

/// The background task was invoked with a failure instead of event data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskCallbackError {
    /// Error reported by the host runtime.
    #[error("host task error: {message}")]
    Host { message: String, code: Option<String> },

    /// Neither data nor error was present.
    #[error("task invoked without event data")]
    MissingData,

    /// The invocation could not be decoded.
    #[error("malformed task invocation: {0}")]
    Malformed(String),
}
