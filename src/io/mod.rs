//! IO modules - external system interfaces
//!
//! - `sim_host` - in-process host (permission, position, geofencing, notifications)
//! - `task_bridge` - TCP listener for task invocations from an external host
//! - `notification_log` - delivered notifications to file (JSONL format)
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod notification_log;
pub mod prometheus;
pub mod sim_host;
pub mod task_bridge;

// Re-export commonly used types
pub use notification_log::{NotificationLog, NotificationRecord};
pub use sim_host::{load_track, SimHost};
pub use task_bridge::{start_task_bridge, TaskBridgeConfig};
