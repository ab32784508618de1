//! Geofence notifier - one fixed geofence, one notification per transition
//!
//! Startup requests location permission, centres the view on the first
//! position fix and registers the configured geofence under a named
//! background task. Transition events are routed to the notification service.
//!
//! Module structure:
//! - `domain/` - Regions, samples, transition events, notifications
//! - `host` - Host service ports (permission, position, geofencing, notifications)
//! - `services/` - Event router and session initialization
//! - `io/` - Simulated host, task bridge, notification log, Prometheus
//! - `infra/` - Config and metrics

use clap::Parser;
use geofence_notifier::infra::{Config, Metrics};
use geofence_notifier::io::{load_track, start_task_bridge, SimHost, TaskBridgeConfig};
use geofence_notifier::services::{GeofenceRouter, Session, SessionPorts};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Geofence notifier - schedules a notification on geofence enter/exit
#[derive(Parser, Debug)]
#[command(name = "geofence-notifier", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// JSON track file replayed through the simulated host
    #[arg(short, long)]
    track: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for per-sample visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "geofence-notifier starting");

    let args = Args::parse();
    let config = Config::load_from_path(Config::resolve_config_path(args.config.as_deref()));

    info!(
        config_file = %config.config_file(),
        task = %config.task_name(),
        region = %config.geofence().identifier,
        latitude = %config.geofence().latitude,
        longitude = %config.geofence().longitude,
        radius_m = %config.geofence().radius_m,
        position_timeout_ms = %config.position_timeout().as_millis(),
        bridge_enabled = %config.bridge_enabled(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // The router needs the scheduler and the host needs the router's sender,
    // so the channel is created first and the host owns one sender.
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(config.channel_capacity());
    let host = Arc::new(SimHost::from_config(&config, event_tx.clone()));

    let router = GeofenceRouter::new(
        config.task_name(),
        host.clone(),
        metrics.clone(),
        event_rx,
    );
    let router_handle = tokio::spawn(router.run());

    let ports = SessionPorts {
        permissions: host.clone(),
        position: host.clone(),
        geofencing: host.clone(),
    };
    let (session, view_rx) = Session::new(&config, ports);

    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_task = config.task_name().to_string();
        let prom_view = view_rx.clone();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = geofence_notifier::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_task,
                prom_view,
                prom_shutdown,
            )
            .await
            {
                error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Ctrl+C flips the shutdown signal
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let outcome = session.start().await;
    info!(view = %view_rx.borrow().status_text(), "view_updated");

    match outcome {
        Ok(outcome) => {
            info!(
                latitude = %outcome.map_region.latitude,
                longitude = %outcome.map_region.longitude,
                latitude_delta = %outcome.map_region.latitude_delta,
                longitude_delta = %outcome.map_region.longitude_delta,
                "map_region_initialized"
            );

            let bridge_config = TaskBridgeConfig {
                port: config.bridge_port(),
                enabled: config.bridge_enabled(),
            };
            let bridge_tx = event_tx.clone();
            let bridge_metrics = metrics.clone();
            let bridge_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    start_task_bridge(bridge_config, bridge_tx, bridge_metrics, bridge_shutdown)
                        .await
                {
                    error!(error = %e, "task bridge error");
                }
            });

            if let Some(path) = args.track.as_deref() {
                match load_track(path) {
                    Ok(samples) => {
                        let track_host = host.clone();
                        let interval = config.track_interval();
                        let track_shutdown = shutdown_rx.clone();
                        tokio::spawn(async move {
                            track_host.run_track(samples, interval, track_shutdown).await;
                        });
                    }
                    Err(e) => warn!(error = %format!("{e:#}"), "track_load_failed"),
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "session_not_started");
        }
    }

    // Stay up until Ctrl+C whether or not the session started; the view is
    // still served over HTTP.
    let mut shutdown = shutdown_rx.clone();
    let _ = shutdown.wait_for(|stop| *stop).await;

    // The host holds a sender for its whole lifetime, so the channel never closes on its own
    router_handle.abort();

    metrics.report().log();
    info!("geofence-notifier shutdown complete");
    Ok(())
}
