//! Geofence transition events and the host's task invocation envelope
//!
//! The host background-task runtime calls the registered task with either an
//! error or a data payload. `TaskInvocation` is that envelope as it appears on
//! the wire (JSON, camelCase):
//!
//! ```json
//! {"data": {"eventType": 1, "region": {...}}, "error": null}
//! {"data": null, "error": {"message": "..."}}
//! ```

use crate::domain::types::GeofenceRegion;
use crate::error::TaskCallbackError;
use serde::{Deserialize, Serialize};

/// Transition direction reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeofenceEventKind {
    Enter,
    Exit,
}

impl GeofenceEventKind {
    /// Decode the host's integer tag (1 = Enter, 2 = Exit)
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            1 => Some(GeofenceEventKind::Enter),
            2 => Some(GeofenceEventKind::Exit),
            _ => None,
        }
    }

    pub fn tag(&self) -> i64 {
        match self {
            GeofenceEventKind::Enter => 1,
            GeofenceEventKind::Exit => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceEventKind::Enter => "enter",
            GeofenceEventKind::Exit => "exit",
        }
    }
}

/// A decoded transition with a determinate kind
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceEvent {
    pub kind: GeofenceEventKind,
    pub region: GeofenceRegion,
}

/// Success payload as delivered by the host, kind still undecoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofencePayload {
    pub event_type: i64,
    pub region: GeofenceRegion,
}

impl GeofencePayload {
    /// Decode the kind tag; an unknown tag hands the payload back unchanged
    pub fn into_event(self) -> Result<GeofenceEvent, GeofencePayload> {
        match GeofenceEventKind::from_tag(self.event_type) {
            Some(kind) => Ok(GeofenceEvent { kind, region: self.region }),
            None => Err(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// One call of the background task by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInvocation {
    #[serde(default)]
    pub data: Option<GeofencePayload>,
    #[serde(default)]
    pub error: Option<TaskErrorPayload>,
}

impl TaskInvocation {
    pub fn event(kind: GeofenceEventKind, region: GeofenceRegion) -> Self {
        Self::raw(kind.tag(), region)
    }

    /// Invocation with an arbitrary kind tag
    pub fn raw(event_type: i64, region: GeofenceRegion) -> Self {
        Self { data: Some(GeofencePayload { event_type, region }), error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(TaskErrorPayload { message: message.into(), code: None }),
        }
    }

    /// Error takes precedence over data; neither present is also a failure
    pub fn into_result(self) -> Result<GeofencePayload, TaskCallbackError> {
        if let Some(err) = self.error {
            return Err(TaskCallbackError::Host { message: err.message, code: err.code });
        }
        self.data.ok_or(TaskCallbackError::MissingData)
    }
}
