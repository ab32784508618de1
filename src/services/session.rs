//! Foreground session initialization
//!
//! permission request -> first position fix -> map view -> geofence registration
//!
//! Each step waits for the previous one. Progress is published as a
//! `ViewState` on a watch channel so a front end can render it.

use crate::domain::{GeofenceRegion, LocationSample, MapRegion, TaskConfig};
use crate::error::SessionError;
use crate::host::{GeofencingService, HostError, PermissionService, PositionService};
use crate::infra::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Title of the marker placed on the current location
pub const MARKER_TITLE: &str = "You are here";

/// What the view currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error(String),
    Ready { location: LocationSample, map_region: MapRegion },
}

impl ViewState {
    /// Text line the view displays for this state
    pub fn status_text(&self) -> String {
        match self {
            ViewState::Loading => "Loading...".to_string(),
            ViewState::Error(message) => message.clone(),
            ViewState::Ready { location, .. } => {
                format!("Your current location: {}, {}", location.latitude, location.longitude)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub location: LocationSample,
    pub map_region: MapRegion,
    pub region: GeofenceRegion,
}

/// Host services the session needs
#[derive(Clone)]
pub struct SessionPorts {
    pub permissions: Arc<dyn PermissionService>,
    pub position: Arc<dyn PositionService>,
    pub geofencing: Arc<dyn GeofencingService>,
}

pub struct Session {
    task: TaskConfig,
    region: GeofenceRegion,
    position_timeout: Duration,
    ports: SessionPorts,
    view_tx: watch::Sender<ViewState>,
}

impl Session {
    /// Create a session and the receiver for its view state
    pub fn new(config: &Config, ports: SessionPorts) -> (Self, watch::Receiver<ViewState>) {
        let (view_tx, view_rx) = watch::channel(ViewState::Loading);
        let session = Self {
            task: config.task(),
            region: config.geofence().clone(),
            position_timeout: config.position_timeout(),
            ports,
            view_tx,
        };
        (session, view_rx)
    }

    /// Run the initialization flow once
    pub async fn start(&self) -> Result<SessionOutcome, SessionError> {
        self.view_tx.send_replace(ViewState::Loading);

        let status = match self.ports.permissions.request_foreground().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "permission_request_failed");
                return Err(self.fail(SessionError::PermissionDenied));
            }
        };
        if !status.is_granted() {
            info!(status = %status.as_str(), "permission_not_granted");
            return Err(self.fail(SessionError::PermissionDenied));
        }
        info!("permission_granted");

        let location = match tokio::time::timeout(
            self.position_timeout,
            self.ports.position.current_position(),
        )
        .await
        {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => return Err(self.fail(SessionError::PositionUnavailable(e))),
            Err(_) => {
                let e = HostError::Timeout(self.position_timeout);
                return Err(self.fail(SessionError::PositionUnavailable(e)));
            }
        };

        let map_region = MapRegion::around(&location);
        info!(
            latitude = %location.latitude,
            longitude = %location.longitude,
            accuracy_m = ?location.accuracy_m,
            "position_acquired"
        );
        self.view_tx.send_replace(ViewState::Ready { location: location.clone(), map_region });

        if let Err(e) = self
            .ports
            .geofencing
            .start_geofencing(&self.task, vec![self.region.clone()])
            .await
        {
            error!(task = %self.task.name(), error = %e, "geofence_registration_failed");
            return Err(SessionError::Registration(e));
        }

        info!(
            task = %self.task.name(),
            region = %self.region.identifier,
            latitude = %self.region.latitude,
            longitude = %self.region.longitude,
            radius_m = %self.region.radius_m,
            "geofence_registered"
        );

        Ok(SessionOutcome { location, map_region, region: self.region.clone() })
    }

    /// Publish the user-visible message, if any, and hand the error back
    fn fail(&self, e: SessionError) -> SessionError {
        match e.user_message() {
            Some(message) => {
                warn!(error = %e, "session_halted");
                self.view_tx.send_replace(ViewState::Error(message.to_string()));
            }
            None => error!(error = %e, "session_halted"),
        }
        e
    }
}
