//! Domain models - geofence regions, transition events, notifications
//!
//! - `types` - regions, location samples, map view, notification requests
//! - `event` - transition kinds and the host's task invocation envelope

pub mod event;
pub mod types;

pub use event::{GeofenceEvent, GeofenceEventKind, GeofencePayload, TaskInvocation};
pub use types::{
    GeofenceRegion, LocationSample, MapRegion, NotificationContent, NotificationId,
    NotificationRequest, TaskConfig,
};
