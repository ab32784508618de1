//! Delivered notification log - JSONL file sink
//!
//! One JSON object per delivered notification, appended to the file given in
//! config. Write failures are logged and reported as `false`, never raised.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
}

pub struct NotificationLog {
    file_path: String,
    write_lock: Mutex<()>,
}

impl NotificationLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "notification_log_initialized");
        Self { file_path: file_path.to_string(), write_lock: Mutex::new(()) }
    }

    /// Append a record; returns true if it was written
    pub fn record(&self, record: &NotificationRecord) -> bool {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                error!(id = %record.id, error = %e, "notification_record_serialize_failed");
                return false;
            }
        };

        match self.append_line(&json) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    id = %record.id,
                    file = %self.file_path,
                    error = %e,
                    "notification_log_write_failed"
                );
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "notification_log_written");

        Ok(())
    }
}
