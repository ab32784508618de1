//! Geofence event router - turns task invocations into notifications
//!
//! The host pushes `TaskInvocation` values onto an mpsc channel; the router
//! is the single consumer. It keeps no state between invocations, so each
//! message is handled on its own: one notification request per recognized
//! transition, nothing for failures or unknown kinds.

use crate::domain::{GeofenceEventKind, NotificationId, NotificationRequest, TaskInvocation};
use crate::error::TaskCallbackError;
use crate::host::NotificationScheduler;
use crate::infra::metrics::Metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What the router decided to do with one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Notify { kind: GeofenceEventKind, region_id: String, request: NotificationRequest },
    CallbackError(TaskCallbackError),
    Unrecognized { tag: i64, region_id: String },
}

/// Pure decision step: no I/O, no counters
pub fn classify(invocation: TaskInvocation) -> Dispatch {
    let payload = match invocation.into_result() {
        Ok(payload) => payload,
        Err(e) => return Dispatch::CallbackError(e),
    };

    match payload.into_event() {
        Ok(event) => {
            let request = match event.kind {
                GeofenceEventKind::Enter => NotificationRequest::entered(),
                GeofenceEventKind::Exit => NotificationRequest::exited(),
            };
            Dispatch::Notify { kind: event.kind, region_id: event.region.identifier, request }
        }
        Err(payload) => Dispatch::Unrecognized {
            tag: payload.event_type,
            region_id: payload.region.identifier,
        },
    }
}

pub struct GeofenceRouter {
    task_name: String,
    scheduler: Arc<dyn NotificationScheduler>,
    metrics: Arc<Metrics>,
    rx: mpsc::Receiver<TaskInvocation>,
}

impl GeofenceRouter {
    pub fn new(
        task_name: impl Into<String>,
        scheduler: Arc<dyn NotificationScheduler>,
        metrics: Arc<Metrics>,
        rx: mpsc::Receiver<TaskInvocation>,
    ) -> Self {
        Self { task_name: task_name.into(), scheduler, metrics, rx }
    }

    /// Consume invocations until every sender is dropped
    pub async fn run(mut self) {
        info!(task = %self.task_name, "router_started");

        while let Some(invocation) = self.rx.recv().await {
            self.handle(invocation).await;
        }

        info!(task = %self.task_name, "router_stopped");
    }

    /// Handle one invocation. Returns the notification id when a request was
    /// accepted by the scheduler.
    pub async fn handle(&self, invocation: TaskInvocation) -> Option<NotificationId> {
        let start = Instant::now();
        let result = self.dispatch(classify(invocation)).await;
        self.metrics.record_event(start.elapsed().as_micros() as u64);
        result
    }

    async fn dispatch(&self, dispatch: Dispatch) -> Option<NotificationId> {
        match dispatch {
            Dispatch::CallbackError(e) => {
                error!(task = %self.task_name, error = %e, "task_callback_error");
                self.metrics.record_callback_error();
                None
            }
            Dispatch::Unrecognized { tag, region_id } => {
                warn!(
                    task = %self.task_name,
                    event_type = %tag,
                    region = %region_id,
                    "geofence_event_kind_unrecognized"
                );
                self.metrics.record_unrecognized_kind();
                None
            }
            Dispatch::Notify { kind, region_id, request } => {
                debug!(
                    task = %self.task_name,
                    kind = %kind.as_str(),
                    region = %region_id,
                    "geofence_transition"
                );
                let delay_ms = request.delay.as_millis() as u64;
                match self.scheduler.schedule(request).await {
                    Ok(id) => {
                        info!(
                            task = %self.task_name,
                            kind = %kind.as_str(),
                            region = %region_id,
                            notification_id = %id,
                            delay_ms = %delay_ms,
                            "notification_scheduled"
                        );
                        self.metrics.record_notification_scheduled();
                        Some(id)
                    }
                    Err(e) => {
                        warn!(
                            task = %self.task_name,
                            kind = %kind.as_str(),
                            error = %e,
                            "notification_schedule_failed"
                        );
                        self.metrics.record_schedule_failure();
                        None
                    }
                }
            }
        }
    }
}

/// Create the invocation channel and its router
///
/// Returns the sender (cloned by every producer) and the router (to be spawned)
pub fn create_router(
    task_name: impl Into<String>,
    scheduler: Arc<dyn NotificationScheduler>,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (mpsc::Sender<TaskInvocation>, GeofenceRouter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (tx, GeofenceRouter::new(task_name, scheduler, metrics, rx))
}
