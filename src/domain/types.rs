//! Shared types for geofence monitoring: regions, samples, map view, notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Mean Earth radius in metres (IUGG)
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Map span shown around the current location
pub const MAP_LATITUDE_DELTA: f64 = 0.0922;
pub const MAP_LONGITUDE_DELTA: f64 = 0.0421;

/// Delay between scheduling a transition notification and its delivery
pub const NOTIFICATION_DELAY: Duration = Duration::from_secs(1);

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Great-circle distance in metres between two WGS84 points
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Circular region monitored by the host for entry/exit transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceRegion {
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in metres
    #[serde(rename = "radius")]
    pub radius_m: f64,
}

impl GeofenceRegion {
    pub fn new(
        identifier: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Self {
        Self { identifier: identifier.into(), latitude, longitude, radius_m }
    }

    /// Distance from the region centre to a point, in metres
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        haversine_m(self.latitude, self.longitude, latitude, longitude)
    }

    /// Boundary counts as inside
    pub fn contains(&self, sample: &LocationSample) -> bool {
        self.distance_to(sample.latitude, sample.longitude) <= self.radius_m
    }
}

/// A single position fix from the position service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, accuracy_m: None, timestamp: Utc::now() }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }
}

/// Visible map area: centre plus span in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Initial view centred on a position fix
    pub fn around(sample: &LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            latitude_delta: MAP_LATITUDE_DELTA,
            longitude_delta: MAP_LONGITUDE_DELTA,
        }
    }
}

/// Name of the durable background task that receives geofence events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    name: String,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Identifier returned by the notification service when a request is accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[repr(transparent)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(new_uuid_v7())
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// A local notification to deliver after `delay`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub content: NotificationContent,
    pub delay: Duration,
}

impl NotificationRequest {
    pub fn entered() -> Self {
        Self {
            content: NotificationContent {
                title: "You entered the geofence!".to_string(),
                body: "You are now inside the specified area.".to_string(),
            },
            delay: NOTIFICATION_DELAY,
        }
    }

    pub fn exited() -> Self {
        Self {
            content: NotificationContent {
                title: "You exited the geofence!".to_string(),
                body: "You are outside the specified area.".to_string(),
            },
            delay: NOTIFICATION_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence() -> GeofenceRegion {
        GeofenceRegion::new("fence", 37.78825, -122.4324, 100.0)
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert!(haversine_m(37.78825, -122.4324, 37.78825, -122.4324).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is ~111.2 km everywhere
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn test_region_contains() {
        let region = fence();
        assert!(region.contains(&LocationSample::new(37.78825, -122.4324)));
        // ~55 m north
        assert!(region.contains(&LocationSample::new(37.7887, -122.4324)));
        // ~1.3 km away
        assert!(!region.contains(&LocationSample::new(37.7749, -122.4194)));
    }

    #[test]
    fn test_map_region_around_sample() {
        let map = MapRegion::around(&LocationSample::new(37.7749, -122.4194));
        assert_eq!(map.latitude, 37.7749);
        assert_eq!(map.longitude, -122.4194);
        assert_eq!(map.latitude_delta, 0.0922);
        assert_eq!(map.longitude_delta, 0.0421);
    }

    #[test]
    fn test_notification_requests() {
        let entered = NotificationRequest::entered();
        assert_eq!(entered.content.title, "You entered the geofence!");
        assert_eq!(entered.delay, Duration::from_secs(1));

        let exited = NotificationRequest::exited();
        assert_eq!(exited.content.title, "You exited the geofence!");
        assert_eq!(exited.content.body, "You are outside the specified area.");
        assert_eq!(exited.delay, entered.delay);
    }

    #[test]
    fn test_region_json_uses_host_field_names() {
        let json = serde_json::to_value(fence()).unwrap();
        assert_eq!(json["radius"], 100.0);
        assert_eq!(json["identifier"], "fence");
    }
}
