//! Host service ports
//!
//! The location, background-task and notification facilities belong to the
//! host platform. The session and the router only talk to them through these
//! traits; `io::sim_host` provides an in-process implementation.

use crate::domain::{
    GeofenceRegion, LocationSample, NotificationId, NotificationRequest, TaskConfig,
};
use async_trait::async_trait;
use std::time::Duration;

/// Errors returned by host services
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Answer to a foreground location permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Undetermined => "undetermined",
        }
    }
}

#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn request_foreground(&self) -> Result<PermissionStatus, HostError>;
}

#[async_trait]
pub trait PositionService: Send + Sync {
    async fn current_position(&self) -> Result<LocationSample, HostError>;
}

/// Registers regions under a named background task. The host invokes that
/// task with transition events for as long as monitoring stays active.
#[async_trait]
pub trait GeofencingService: Send + Sync {
    async fn start_geofencing(
        &self,
        task: &TaskConfig,
        regions: Vec<GeofenceRegion>,
    ) -> Result<(), HostError>;
}

/// Schedules a local notification. Returns once the request is accepted;
/// delivery happens after `request.delay`.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, HostError>;
}
