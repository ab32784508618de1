//! End-to-end tests: session startup, transitions from the simulated host,
//! routing to notifications and delivery to the notification log.

use geofence_notifier::domain::{
    GeofenceEventKind, GeofenceRegion, LocationSample, NotificationId, NotificationRequest,
    TaskInvocation,
};
use geofence_notifier::error::SessionError;
use geofence_notifier::host::{HostError, NotificationScheduler, PermissionStatus};
use geofence_notifier::infra::{Config, Metrics};
use geofence_notifier::io::{NotificationLog, SimHost};
use geofence_notifier::services::{create_router, Session, SessionPorts, ViewState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

/// Scheduler that only records what it was asked to do
#[derive(Default)]
struct RecordingScheduler {
    requests: Mutex<Vec<NotificationRequest>>,
}

#[async_trait::async_trait]
impl NotificationScheduler for RecordingScheduler {
    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, HostError> {
        self.requests.lock().push(request);
        Ok(NotificationId::generate())
    }
}

fn ports(host: &Arc<SimHost>) -> SessionPorts {
    SessionPorts {
        permissions: host.clone(),
        position: host.clone(),
        geofencing: host.clone(),
    }
}

#[tokio::test]
async fn test_denied_permission_registers_nothing() {
    let (tx, _rx) = mpsc::channel(8);
    let host = Arc::new(SimHost::new(
        PermissionStatus::Denied,
        Some(LocationSample::new(37.7749, -122.4194)),
        tx,
    ));
    let (session, view_rx) = Session::new(&Config::default(), ports(&host));

    let result = session.start().await;

    assert!(matches!(result, Err(SessionError::PermissionDenied)));
    assert_eq!(view_rx.borrow().status_text(), "Permission to access location was denied");
    assert!(!host.is_monitoring());
}

#[tokio::test]
async fn test_startup_centres_map_and_registers_fence() {
    let (tx, _rx) = mpsc::channel(8);
    let host = Arc::new(SimHost::new(
        PermissionStatus::Granted,
        Some(LocationSample::new(37.7749, -122.4194)),
        tx,
    ));
    let (session, view_rx) = Session::new(&Config::default(), ports(&host));

    let outcome = session.start().await.unwrap();

    assert_eq!(outcome.map_region.latitude, 37.7749);
    assert_eq!(outcome.map_region.longitude, -122.4194);
    assert_eq!(outcome.map_region.latitude_delta, 0.0922);
    assert_eq!(outcome.map_region.longitude_delta, 0.0421);
    assert_eq!(outcome.region.latitude, 37.78825);
    assert_eq!(outcome.region.longitude, -122.4324);
    assert_eq!(outcome.region.radius_m, 100.0);
    assert!(host.is_monitoring());
    assert!(matches!(*view_rx.borrow(), ViewState::Ready { .. }));
}

#[tokio::test]
async fn test_no_fix_leaves_fence_unregistered() {
    let (tx, _rx) = mpsc::channel(8);
    let host = Arc::new(SimHost::new(PermissionStatus::Granted, None, tx));
    let (session, view_rx) = Session::new(&Config::default(), ports(&host));

    assert!(matches!(session.start().await, Err(SessionError::PositionUnavailable(_))));
    assert!(matches!(*view_rx.borrow(), ViewState::Error(_)));
    assert!(!host.is_monitoring());
}

#[tokio::test]
async fn test_walk_through_fence_schedules_enter_and_exit() {
    let metrics = Arc::new(Metrics::new());
    let scheduler = Arc::new(RecordingScheduler::default());
    let (tx, router) = create_router("GEO_FENCING_TASK", scheduler.clone(), metrics.clone(), 16);

    let host = Arc::new(SimHost::new(
        PermissionStatus::Granted,
        Some(LocationSample::new(37.7749, -122.4194)),
        tx,
    ));
    let (session, _view_rx) = Session::new(&Config::default(), ports(&host));
    session.start().await.unwrap();

    let router_handle = tokio::spawn(router.run());

    host.feed(&LocationSample::new(37.7749, -122.4194));
    host.feed(&LocationSample::new(37.7883, -122.4325));
    host.feed(&LocationSample::new(37.7882, -122.4323));
    host.feed(&LocationSample::new(37.7920, -122.4370));

    // Dropping the host drops the last sender and lets the router finish
    drop(session);
    drop(host);
    router_handle.await.unwrap();

    let requests = scheduler.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].content.title, "You entered the geofence!");
    assert_eq!(requests[1].content.title, "You exited the geofence!");
    assert!(requests.iter().all(|r| r.delay == Duration::from_secs(1)));
    assert_eq!(metrics.events_total(), 2);
    assert_eq!(metrics.notifications_scheduled(), 2);
}

#[tokio::test]
async fn test_error_invocation_then_enter() {
    let metrics = Arc::new(Metrics::new());
    let scheduler = Arc::new(RecordingScheduler::default());
    let (tx, router) = create_router("GEO_FENCING_TASK", scheduler.clone(), metrics.clone(), 16);
    let region = GeofenceRegion::new("fence", 37.78825, -122.4324, 100.0);

    let error: TaskInvocation =
        serde_json::from_str(r#"{"error":{"message":"E"},"data":null}"#).unwrap();
    tx.send(error).await.unwrap();
    tx.send(TaskInvocation::raw(9, region.clone())).await.unwrap();
    tx.send(TaskInvocation::event(GeofenceEventKind::Enter, region)).await.unwrap();
    drop(tx);

    router.run().await;

    let requests = scheduler.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0], NotificationRequest::entered());
    assert_eq!(metrics.callback_errors(), 1);
    assert_eq!(metrics.unrecognized_kinds(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sim_host_delivers_routed_notification() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("notifications.jsonl");
    let metrics = Arc::new(Metrics::new());

    let (tx, rx) = mpsc::channel(16);
    let host = Arc::new(
        SimHost::new(PermissionStatus::Granted, Some(LocationSample::new(37.7749, -122.4194)), tx)
            .with_notification_log(Arc::new(NotificationLog::new(log_path.to_str().unwrap()))),
    );
    let router = geofence_notifier::services::GeofenceRouter::new(
        "GEO_FENCING_TASK",
        host.clone(),
        metrics.clone(),
        rx,
    );
    let router_handle = tokio::spawn(router.run());

    let (session, _view_rx) = Session::new(&Config::default(), ports(&host));
    session.start().await.unwrap();

    host.feed(&LocationSample::new(37.7883, -122.4325));

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["title"], "You entered the geofence!");
    assert_eq!(record["body"], "You are now inside the specified area.");
    assert_eq!(metrics.notifications_scheduled(), 1);

    router_handle.abort();
}
