//! Prometheus metrics HTTP endpoint
//!
//! - `GET /metrics` - router counters in Prometheus text format
//! - `GET /health`  - liveness
//! - `GET /view`    - current view state as JSON
//!
//! Uses hyper for the HTTP server.

use crate::infra::metrics::Metrics;
use crate::services::session::{ViewState, MARKER_TITLE};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Write a counter with task label
fn write_counter(output: &mut String, name: &str, help: &str, task: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name}{{task=\"{task}\"}} {val}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, task: &str) -> String {
    let mut output = String::with_capacity(2048);

    write_counter(
        &mut output,
        "geofence_events_total",
        "Task invocations handled by the router",
        task,
        metrics.events_total(),
    );
    write_counter(
        &mut output,
        "geofence_notifications_scheduled_total",
        "Notification requests accepted by the scheduler",
        task,
        metrics.notifications_scheduled(),
    );
    write_counter(
        &mut output,
        "geofence_schedule_failures_total",
        "Notification requests rejected by the scheduler",
        task,
        metrics.schedule_failures(),
    );
    write_counter(
        &mut output,
        "geofence_callback_errors_total",
        "Task invocations carrying an error instead of event data",
        task,
        metrics.callback_errors(),
    );
    write_counter(
        &mut output,
        "geofence_unrecognized_kinds_total",
        "Task invocations with an unknown event type",
        task,
        metrics.unrecognized_kinds(),
    );
    write_counter(
        &mut output,
        "geofence_bridge_dropped_total",
        "Bridge invocations dropped because the router queue was full",
        task,
        metrics.bridge_dropped(),
    );

    output
}

fn view_json(view: &ViewState) -> serde_json::Value {
    match view {
        ViewState::Loading => json!({ "status": "loading", "text": view.status_text() }),
        ViewState::Error(_) => json!({ "status": "error", "text": view.status_text() }),
        ViewState::Ready { location, map_region } => json!({
            "status": "ready",
            "text": view.status_text(),
            "region": map_region,
            "marker": {
                "latitude": location.latitude,
                "longitude": location.longitude,
                "title": MARKER_TITLE,
            },
        }),
    }
}

/// Build the response for a method and path
fn route(
    method: &Method,
    path: &str,
    metrics: &Metrics,
    task: &str,
    view: &watch::Receiver<ViewState>,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(metrics, task);
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail")
        }
        (&Method::GET, "/health") => Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail"),
        (&Method::GET, "/view") => {
            let body = view_json(&view.borrow()).to_string();
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail")
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail"),
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    task: Arc<String>,
    view: watch::Receiver<ViewState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &metrics, &task, &view))
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    task: String,
    view: watch::Receiver<ViewState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let task = Arc::new(task);

    info!(port = %port, task = %task, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let task = task.clone();
                        let view = view.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let task = task.clone();
                                let view = view.clone();
                                async move { handle_request(req, metrics, task, view).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
