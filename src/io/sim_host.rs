//! In-process host: permission, position, geofencing and notifications
//!
//! Stands in for the device platform when running on a workstation or in
//! tests. Geofence transitions are derived from location samples fed via
//! `feed` (or replayed from a track file) and pushed onto the router channel
//! as `TaskInvocation`s, the same shape an external host delivers through the
//! task bridge.

use crate::domain::{
    GeofenceEventKind, GeofenceRegion, LocationSample, NotificationId, NotificationRequest,
    TaskConfig, TaskInvocation,
};
use crate::host::{
    GeofencingService, HostError, NotificationScheduler, PermissionService, PermissionStatus,
    PositionService,
};
use crate::infra::config::Config;
use crate::io::notification_log::{NotificationLog, NotificationRecord};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Active monitoring registration
struct Monitor {
    task: String,
    /// Region plus whether the last sample was inside (None before the first sample)
    regions: Vec<(GeofenceRegion, Option<bool>)>,
}

pub struct SimHost {
    permission: PermissionStatus,
    position: Option<LocationSample>,
    event_tx: mpsc::Sender<TaskInvocation>,
    monitor: Mutex<Option<Monitor>>,
    notification_log: Option<Arc<NotificationLog>>,
}

impl SimHost {
    pub fn new(
        permission: PermissionStatus,
        position: Option<LocationSample>,
        event_tx: mpsc::Sender<TaskInvocation>,
    ) -> Self {
        Self { permission, position, event_tx, monitor: Mutex::new(None), notification_log: None }
    }

    pub fn from_config(config: &Config, event_tx: mpsc::Sender<TaskInvocation>) -> Self {
        let host = Self::new(config.sim_permission(), config.sim_position().cloned(), event_tx);
        match config.notification_log_file() {
            Some(path) => host.with_notification_log(Arc::new(NotificationLog::new(path))),
            None => host,
        }
    }

    pub fn with_notification_log(mut self, log: Arc<NotificationLog>) -> Self {
        self.notification_log = Some(log);
        self
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.lock().is_some()
    }

    /// Evaluate one sample against every monitored region and push an
    /// invocation per transition. Returns how many were delivered.
    pub fn feed(&self, sample: &LocationSample) -> usize {
        let (task, transitions) = {
            let mut guard = self.monitor.lock();
            let Some(monitor) = guard.as_mut() else {
                debug!("sample_ignored_not_monitoring");
                return 0;
            };

            let mut transitions = Vec::new();
            for (region, last_inside) in monitor.regions.iter_mut() {
                let inside = region.contains(sample);
                let kind = match (*last_inside, inside) {
                    (None, true) | (Some(false), true) => Some(GeofenceEventKind::Enter),
                    (Some(true), false) => Some(GeofenceEventKind::Exit),
                    _ => None,
                };
                *last_inside = Some(inside);
                if let Some(kind) = kind {
                    transitions.push(TaskInvocation::event(kind, region.clone()));
                }
            }
            (monitor.task.clone(), transitions)
        };

        let mut delivered = 0;
        for invocation in transitions {
            match self.event_tx.try_send(invocation) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(task = %task, "sim_host_task_queue_full");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(task = %task, "sim_host_task_channel_closed");
                }
            }
        }
        delivered
    }

    /// Replay samples at a fixed interval until done or shutdown
    pub async fn run_track(
        &self,
        samples: Vec<LocationSample>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            samples = %samples.len(),
            interval_ms = %interval.as_millis(),
            "track_replay_started"
        );
        let mut ticker = tokio::time::interval(interval);

        for sample in samples {
            tokio::select! {
                _ = ticker.tick() => {
                    let delivered = self.feed(&sample);
                    debug!(
                        latitude = %sample.latitude,
                        longitude = %sample.longitude,
                        transitions = %delivered,
                        "track_sample"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("track_replay_shutdown");
                        return;
                    }
                }
            }
        }

        info!("track_replay_finished");
    }
}

/// Load a track file: a JSON array of location samples
pub fn load_track<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<LocationSample>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read track file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse track file {}", path.display()))
}

#[async_trait]
impl PermissionService for SimHost {
    async fn request_foreground(&self) -> Result<PermissionStatus, HostError> {
        Ok(self.permission)
    }
}

#[async_trait]
impl PositionService for SimHost {
    async fn current_position(&self) -> Result<LocationSample, HostError> {
        match &self.position {
            Some(sample) => Ok(LocationSample { timestamp: Utc::now(), ..sample.clone() }),
            None => Err(HostError::Unavailable("no position fix".to_string())),
        }
    }
}

#[async_trait]
impl GeofencingService for SimHost {
    async fn start_geofencing(
        &self,
        task: &TaskConfig,
        regions: Vec<GeofenceRegion>,
    ) -> Result<(), HostError> {
        if regions.is_empty() {
            return Err(HostError::Rejected("at least one region is required".to_string()));
        }
        if let Some(bad) = regions.iter().find(|r| r.radius_m.is_nan() || r.radius_m <= 0.0) {
            return Err(HostError::Rejected(format!(
                "region {} has non-positive radius {}",
                bad.identifier, bad.radius_m
            )));
        }

        let count = regions.len();
        let previous = self.monitor.lock().replace(Monitor {
            task: task.name().to_string(),
            regions: regions.into_iter().map(|r| (r, None)).collect(),
        });
        if previous.is_some() {
            debug!(task = %task.name(), "sim_host_monitoring_replaced");
        }
        info!(task = %task.name(), regions = %count, "sim_host_monitoring_started");
        Ok(())
    }
}

#[async_trait]
impl NotificationScheduler for SimHost {
    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, HostError> {
        let id = NotificationId::generate();
        let scheduled_at = Utc::now();
        let log = self.notification_log.clone();
        let delivery_id = id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(request.delay).await;
            info!(
                id = %delivery_id,
                title = %request.content.title,
                body = %request.content.body,
                "notification_delivered"
            );
            if let Some(log) = log {
                log.record(&NotificationRecord {
                    id: delivery_id.0,
                    title: request.content.title,
                    body: request.content.body,
                    scheduled_at,
                    delivered_at: Utc::now(),
                });
            }
        });

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fence() -> GeofenceRegion {
        GeofenceRegion::new("fence", 37.78825, -122.4324, 100.0)
    }

    fn outside() -> LocationSample {
        LocationSample::new(37.7749, -122.4194)
    }

    fn inside() -> LocationSample {
        LocationSample::new(37.7883, -122.4325)
    }

    async fn monitoring_host() -> (SimHost, mpsc::Receiver<TaskInvocation>) {
        let (tx, rx) = mpsc::channel(16);
        let host = SimHost::new(PermissionStatus::Granted, Some(outside()), tx);
        host.start_geofencing(&TaskConfig::new("GEO_FENCING_TASK"), vec![fence()]).await.unwrap();
        (host, rx)
    }

    fn kind_of(invocation: TaskInvocation) -> GeofenceEventKind {
        invocation.into_result().unwrap().into_event().unwrap().kind
    }

    #[tokio::test]
    async fn test_samples_before_registration_are_ignored() {
        let (tx, mut rx) = mpsc::channel(4);
        let host = SimHost::new(PermissionStatus::Granted, None, tx);
        assert_eq!(host.feed(&inside()), 0);
        assert!(rx.try_recv().is_err());
        assert!(!host.is_monitoring());
    }

    #[tokio::test]
    async fn test_crossing_emits_enter_then_exit() {
        let (host, mut rx) = monitoring_host().await;

        assert_eq!(host.feed(&outside()), 0);
        assert_eq!(host.feed(&inside()), 1);
        assert_eq!(host.feed(&inside()), 0);
        assert_eq!(host.feed(&outside()), 1);

        assert_eq!(kind_of(rx.recv().await.unwrap()), GeofenceEventKind::Enter);
        assert_eq!(kind_of(rx.recv().await.unwrap()), GeofenceEventKind::Exit);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_first_sample_inside_reports_enter() {
        let (host, mut rx) = monitoring_host().await;
        assert_eq!(host.feed(&inside()), 1);
        assert_eq!(kind_of(rx.recv().await.unwrap()), GeofenceEventKind::Enter);
    }

    #[tokio::test]
    async fn test_staying_outside_emits_nothing() {
        let (host, mut rx) = monitoring_host().await;
        for _ in 0..5 {
            assert_eq!(host.feed(&outside()), 0);
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_registration_rejects_empty_and_bad_radius() {
        let (tx, _rx) = mpsc::channel(4);
        let host = SimHost::new(PermissionStatus::Granted, None, tx);
        let task = TaskConfig::new("GEO_FENCING_TASK");

        assert!(host.start_geofencing(&task, vec![]).await.is_err());
        let bad = GeofenceRegion::new("bad", 0.0, 0.0, 0.0);
        assert!(host.start_geofencing(&task, vec![bad]).await.is_err());
        assert!(!host.is_monitoring());
    }

    #[tokio::test]
    async fn test_position_without_fix_is_unavailable() {
        let (tx, _rx) = mpsc::channel(4);
        let host = SimHost::new(PermissionStatus::Granted, None, tx);
        assert!(matches!(host.current_position().await, Err(HostError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_delivered_after_delay() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("notifications.jsonl");
        let (tx, _rx) = mpsc::channel(4);
        let host = SimHost::new(PermissionStatus::Granted, None, tx)
            .with_notification_log(Arc::new(NotificationLog::new(file_path.to_str().unwrap())));

        let id = host.schedule(NotificationRequest::entered()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!file_path.exists());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let content = std::fs::read_to_string(&file_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["id"], id.0);
        assert_eq!(parsed["title"], "You entered the geofence!");
    }

    #[test]
    fn test_load_track() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(
            &path,
            concat!(
                r#"[{"latitude":37.7749,"longitude":-122.4194},"#,
                r#"{"latitude":37.7883,"longitude":-122.4325,"accuracy_m":5.0}]"#
            ),
        )
        .unwrap();

        let track = load_track(&path).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track[1].accuracy_m, Some(5.0));
        assert!(load_track(dir.path().join("missing.json")).is_err());
    }
}
