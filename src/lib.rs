//! Geofence notifier library
//!
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod error;
pub mod host;
pub mod infra;
pub mod io;
pub mod services;
