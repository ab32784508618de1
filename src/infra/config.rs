//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section is optional; missing values fall back to the defaults below.

use crate::domain::types::new_uuid_v7;
use crate::domain::{GeofenceRegion, LocationSample, TaskConfig};
use crate::host::PermissionStatus;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct TaskSection {
    #[serde(default = "default_task_name")]
    pub name: String,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self { name: default_task_name() }
    }
}

fn default_task_name() -> String {
    "GEO_FENCING_TASK".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceSection {
    /// Region identifier; a UUIDv7 is generated when absent
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default = "default_geofence_latitude")]
    pub latitude: f64,
    #[serde(default = "default_geofence_longitude")]
    pub longitude: f64,
    #[serde(default = "default_geofence_radius_m")]
    pub radius_m: f64,
}

impl Default for GeofenceSection {
    fn default() -> Self {
        Self {
            identifier: None,
            latitude: default_geofence_latitude(),
            longitude: default_geofence_longitude(),
            radius_m: default_geofence_radius_m(),
        }
    }
}

fn default_geofence_latitude() -> f64 {
    37.78825
}

fn default_geofence_longitude() -> f64 {
    -122.4324
}

fn default_geofence_radius_m() -> f64 {
    100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionSection {
    /// Upper bound on the first position fix
    #[serde(default = "default_position_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PositionSection {
    fn default() -> Self {
        Self { timeout_ms: default_position_timeout_ms() }
    }
}

fn default_position_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity() }
    }
}

fn default_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSection {
    /// Answer given to the permission request
    #[serde(default = "default_sim_permission")]
    pub permission: PermissionStatus,
    /// When false the position service never produces a fix
    #[serde(default = "default_fix_available")]
    pub fix_available: bool,
    /// Position fix reported at startup
    #[serde(default = "default_sim_latitude")]
    pub latitude: f64,
    #[serde(default = "default_sim_longitude")]
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Interval between samples when replaying a track file
    #[serde(default = "default_track_interval_ms")]
    pub track_interval_ms: u64,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            permission: default_sim_permission(),
            fix_available: default_fix_available(),
            latitude: default_sim_latitude(),
            longitude: default_sim_longitude(),
            accuracy_m: None,
            track_interval_ms: default_track_interval_ms(),
        }
    }
}

fn default_sim_permission() -> PermissionStatus {
    PermissionStatus::Granted
}

fn default_fix_available() -> bool {
    true
}

fn default_sim_latitude() -> f64 {
    37.7749
}

fn default_sim_longitude() -> f64 {
    -122.4194
}

fn default_track_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSection {
    #[serde(default = "default_bridge_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bridge_port")]
    pub port: u16,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self { enabled: default_bridge_enabled(), port: default_bridge_port() }
    }
}

fn default_bridge_enabled() -> bool {
    true
}

fn default_bridge_port() -> u16 {
    25900
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationLogSection {
    /// JSONL file for delivered notifications; empty disables the log
    #[serde(default = "default_notification_log_file")]
    pub file: String,
}

impl Default for NotificationLogSection {
    fn default() -> Self {
        Self { file: default_notification_log_file() }
    }
}

fn default_notification_log_file() -> String {
    "notifications.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            interval_secs: default_metrics_interval_secs(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

fn default_metrics_interval_secs() -> u64 {
    10
}

fn default_prometheus_port() -> u16 {
    9100
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub task: TaskSection,
    #[serde(default)]
    pub geofence: GeofenceSection,
    #[serde(default)]
    pub position: PositionSection,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub simulator: SimulatorSection,
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub notification_log: NotificationLogSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    task_name: String,
    geofence: GeofenceRegion,
    position_timeout_ms: u64,
    channel_capacity: usize,
    sim_permission: PermissionStatus,
    sim_position: Option<LocationSample>,
    track_interval_ms: u64,
    bridge_enabled: bool,
    bridge_port: u16,
    notification_log_file: Option<String>,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        let geofence = toml_config.geofence;
        let identifier = geofence.identifier.unwrap_or_else(new_uuid_v7);

        let sim = toml_config.simulator;
        let sim_position = sim.fix_available.then(|| {
            let sample = LocationSample::new(sim.latitude, sim.longitude);
            match sim.accuracy_m {
                Some(accuracy) => sample.with_accuracy(accuracy),
                None => sample,
            }
        });

        let log_file = toml_config.notification_log.file;

        Self {
            task_name: toml_config.task.name,
            geofence: GeofenceRegion::new(
                identifier,
                geofence.latitude,
                geofence.longitude,
                geofence.radius_m,
            ),
            position_timeout_ms: toml_config.position.timeout_ms,
            channel_capacity: toml_config.router.channel_capacity.max(1),
            sim_permission: sim.permission,
            sim_position,
            track_interval_ms: sim.track_interval_ms.max(1),
            bridge_enabled: toml_config.bridge.enabled,
            bridge_port: toml_config.bridge.port,
            notification_log_file: if log_file.is_empty() { None } else { Some(log_file) },
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli: Option<&str>) -> String {
        if let Some(path) = cli {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Task name wrapped for the geofencing service
    pub fn task(&self) -> TaskConfig {
        TaskConfig::new(self.task_name.clone())
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn geofence(&self) -> &GeofenceRegion {
        &self.geofence
    }

    pub fn position_timeout(&self) -> Duration {
        Duration::from_millis(self.position_timeout_ms)
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn sim_permission(&self) -> PermissionStatus {
        self.sim_permission
    }

    pub fn sim_position(&self) -> Option<&LocationSample> {
        self.sim_position.as_ref()
    }

    pub fn track_interval(&self) -> Duration {
        Duration::from_millis(self.track_interval_ms)
    }

    pub fn bridge_enabled(&self) -> bool {
        self.bridge_enabled
    }

    pub fn bridge_port(&self) -> u16 {
        self.bridge_port
    }

    pub fn notification_log_file(&self) -> Option<&str> {
        self.notification_log_file.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to shorten the position timeout
    #[cfg(test)]
    pub fn with_position_timeout_ms(mut self, ms: u64) -> Self {
        self.position_timeout_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.task_name(), "GEO_FENCING_TASK");
        assert_eq!(config.geofence().latitude, 37.78825);
        assert_eq!(config.geofence().longitude, -122.4324);
        assert_eq!(config.geofence().radius_m, 100.0);
        assert_eq!(config.position_timeout(), Duration::from_secs(30));
        assert_eq!(config.channel_capacity(), 64);
        assert_eq!(config.sim_permission(), PermissionStatus::Granted);
        assert_eq!(config.notification_log_file(), Some("notifications.jsonl"));
        assert_eq!(config.prometheus_port(), 9100);
    }

    #[test]
    fn test_default_identifier_is_generated() {
        let config = Config::default();
        assert!(!config.geofence().identifier.is_empty());
        assert_ne!(config.geofence().identifier, Config::default().geofence().identifier);
    }

    #[test]
    fn test_sim_position_partial_override() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[simulator]
latitude = 1.0
"#,
        )
        .unwrap();
        // longitude keeps its default
        let config = Config::from_toml(toml_config, "inline");
        let position = config.sim_position().unwrap();
        assert_eq!(position.latitude, 1.0);
        assert_eq!(position.longitude, -122.4194);
    }

    #[test]
    fn test_fix_unavailable() {
        let toml_config: TomlConfig =
            toml::from_str("[simulator]\nfix_available = false\n").unwrap();
        assert!(Config::from_toml(toml_config, "inline").sim_position().is_none());
    }

    #[test]
    fn test_empty_log_file_disables_log() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[notification_log]
file = ""
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline");
        assert_eq!(config.notification_log_file(), None);
    }

    #[test]
    fn test_resolve_config_path_from_cli() {
        assert_eq!(Config::resolve_config_path(Some("config/site.toml")), "config/site.toml");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let toml_config: TomlConfig = toml::from_str("[router]\nchannel_capacity = 0\n").unwrap();
        assert_eq!(Config::from_toml(toml_config, "inline").channel_capacity(), 1);
    }

    #[test]
    fn test_zero_track_interval_clamped() {
        let toml_config: TomlConfig =
            toml::from_str("[simulator]\ntrack_interval_ms = 0\n").unwrap();
        let config = Config::from_toml(toml_config, "inline");
        assert_eq!(config.track_interval(), Duration::from_millis(1));
    }
}
