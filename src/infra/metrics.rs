//! Lock-free router counters and periodic reporting
//!
//! All atomics use Relaxed ordering: these are statistics only and are never
//! used to coordinate the router or the producers.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

pub struct Metrics {
    events_total: AtomicU64,
    events_since_report: AtomicU64,
    notifications_scheduled: AtomicU64,
    schedule_failures: AtomicU64,
    callback_errors: AtomicU64,
    unrecognized_kinds: AtomicU64,
    bridge_dropped: AtomicU64,
    dispatch_latency_sum_us: AtomicU64,
    dispatch_latency_max_us: AtomicU64,
    last_report_time: Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_total: AtomicU64::new(0),
            events_since_report: AtomicU64::new(0),
            notifications_scheduled: AtomicU64::new(0),
            schedule_failures: AtomicU64::new(0),
            callback_errors: AtomicU64::new(0),
            unrecognized_kinds: AtomicU64::new(0),
            bridge_dropped: AtomicU64::new(0),
            dispatch_latency_sum_us: AtomicU64::new(0),
            dispatch_latency_max_us: AtomicU64::new(0),
            last_report_time: Mutex::new(Instant::now()),
        }
    }

    /// Record one task invocation handled by the router
    #[inline]
    pub fn record_event(&self, latency_us: u64) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
        self.events_since_report.fetch_add(1, Ordering::Relaxed);
        self.dispatch_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.dispatch_latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_notification_scheduled(&self) {
        self.notifications_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_schedule_failure(&self) {
        self.schedule_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_callback_error(&self) {
        self.callback_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unrecognized_kind(&self) {
        self.unrecognized_kinds.fetch_add(1, Ordering::Relaxed);
    }

    /// Invocation dropped by the task bridge because the router queue was full
    #[inline]
    pub fn record_bridge_drop(&self) {
        self.bridge_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_total(&self) -> u64 {
        self.events_total.load(Ordering::Relaxed)
    }

    pub fn notifications_scheduled(&self) -> u64 {
        self.notifications_scheduled.load(Ordering::Relaxed)
    }

    pub fn schedule_failures(&self) -> u64 {
        self.schedule_failures.load(Ordering::Relaxed)
    }

    pub fn callback_errors(&self) -> u64 {
        self.callback_errors.load(Ordering::Relaxed)
    }

    pub fn unrecognized_kinds(&self) -> u64 {
        self.unrecognized_kinds.load(Ordering::Relaxed)
    }

    pub fn bridge_dropped(&self) -> u64 {
        self.bridge_dropped.load(Ordering::Relaxed)
    }

    /// Snapshot counters; per-interval rate and latency are reset
    pub fn report(&self) -> MetricsSummary {
        let events_count = self.events_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.dispatch_latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.dispatch_latency_max_us.swap(0, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let secs = elapsed.as_secs_f64();
        let events_per_sec = if secs > 0.0 { events_count as f64 / secs } else { 0.0 };
        let avg_latency_us = if events_count > 0 { latency_sum / events_count } else { 0 };

        MetricsSummary {
            events_total: self.events_total(),
            events_per_sec,
            avg_dispatch_latency_us: avg_latency_us,
            max_dispatch_latency_us: max_latency,
            notifications_scheduled: self.notifications_scheduled(),
            schedule_failures: self.schedule_failures(),
            callback_errors: self.callback_errors(),
            unrecognized_kinds: self.unrecognized_kinds(),
            bridge_dropped: self.bridge_dropped(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub events_total: u64,
    pub events_per_sec: f64,
    pub avg_dispatch_latency_us: u64,
    pub max_dispatch_latency_us: u64,
    pub notifications_scheduled: u64,
    pub schedule_failures: u64,
    pub callback_errors: u64,
    pub unrecognized_kinds: u64,
    pub bridge_dropped: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            events_total = %self.events_total,
            events_per_sec = format!("{:.2}", self.events_per_sec),
            avg_latency_us = %self.avg_dispatch_latency_us,
            max_latency_us = %self.max_dispatch_latency_us,
            notifications = %self.notifications_scheduled,
            schedule_failures = %self.schedule_failures,
            callback_errors = %self.callback_errors,
            unrecognized = %self.unrecognized_kinds,
            bridge_dropped = %self.bridge_dropped,
            "metrics"
        );
    }
}
