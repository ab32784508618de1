//! Task bridge - TCP listener for task invocations from an external host
//!
//! Protocol: one JSON `TaskInvocation` per line, e.g.
//! `{"data":{"eventType":1,"region":{...}},"error":null}`
//!
//! Invocations are forwarded to the router with try_send so a slow router
//! never blocks a connection; drops are counted in metrics.

use crate::domain::TaskInvocation;
use crate::error::TaskCallbackError;
use crate::infra::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Task bridge configuration
#[derive(Debug, Clone)]
pub struct TaskBridgeConfig {
    pub port: u16,
    pub enabled: bool,
}

impl Default for TaskBridgeConfig {
    fn default() -> Self {
        Self { port: 25900, enabled: true }
    }
}

/// Start the task bridge listener
pub async fn start_task_bridge(
    config: TaskBridgeConfig,
    event_tx: mpsc::Sender<TaskInvocation>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.enabled {
        info!("task_bridge_disabled");
        return Ok(());
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(port = %config.port, "task_bridge_started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("task_bridge_shutdown");
                    return Ok(());
                }
            }
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        let tx = event_tx.clone();
                        let m = metrics.clone();
                        tokio::spawn(async move {
                            handle_connection(socket, addr, tx, m).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "task_bridge_accept_failed");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    event_tx: mpsc::Sender<TaskInvocation>,
    metrics: Arc<Metrics>,
) {
    let peer = addr.to_string();
    debug!(peer = %peer, "task_bridge_connection_accepted");
    let forwarded = forward_lines(BufReader::new(socket), &peer, &event_tx, &metrics).await;
    debug!(peer = %peer, forwarded = %forwarded, "task_bridge_connection_closed");
}

/// Decode one line; blank lines yield None
pub fn decode_line(line: &str) -> Option<Result<TaskInvocation, TaskCallbackError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line).map_err(|e| TaskCallbackError::Malformed(e.to_string())))
}

/// Read invocations line by line and forward them. Returns how many were
/// accepted by the channel.
pub async fn forward_lines<R>(
    reader: R,
    peer: &str,
    event_tx: &mpsc::Sender<TaskInvocation>,
    metrics: &Metrics,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn: Option<Instant> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        let invocation = match decode_line(&line) {
            None => continue,
            Some(Ok(invocation)) => invocation,
            Some(Err(e)) => {
                warn!(peer = %peer, error = %e, "task_bridge_malformed_line");
                metrics.record_callback_error();
                continue;
            }
        };

        match event_tx.try_send(invocation) {
            Ok(()) => forwarded += 1,
            Err(TrySendError::Full(_)) => {
                metrics.record_bridge_drop();
                if last_drop_warn.map_or(true, |t| t.elapsed() > Duration::from_secs(1)) {
                    warn!(peer = %peer, "task_invocation_dropped: channel full");
                    last_drop_warn = Some(Instant::now());
                }
            }
            Err(TrySendError::Closed(_)) => {
                warn!(peer = %peer, "task_bridge_channel_closed");
                break;
            }
        }
    }

    forwarded
}
