//! TCP listener for train and vehicle reports
//!
//! Listens on port 7700 for connections from roadside equipment.
//! Protocol: one JSON report per line, one JSON answer per line.
//! Reports are applied to the intersection controller synchronously, so
//! the answer already reflects the state change and, for train reports,
//! how many notifications were delivered.

use crate::domain::types::{ReportRequest, ReportResponse};
use crate::infra::metrics::Metrics;
use crate::services::controller::IntersectionController;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Report listener configuration
#[derive(Debug, Clone)]
pub struct ReportListenerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enabled: bool,
}

impl Default for ReportListenerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 7700, enabled: true }
    }
}

/// Start the report TCP listener
///
/// Accepts connections from sensor feeds and vehicle units, applies each
/// report through the controller, and answers on the same connection.
pub async fn start_report_listener(
    config: ReportListenerConfig,
    controller: Arc<IntersectionController>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.enabled {
        info!("report_listener_disabled");
        return Ok(());
    }

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "report_listener_started");

    loop {
        tokio::select! {
            // Check for shutdown
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("report_listener_shutdown");
                    return Ok(());
                }
            }
            // Accept new connections
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        let controller = controller.clone();
                        let m = metrics.clone();
                        tokio::spawn(async move {
                            handle_report_connection(socket, addr, controller, m).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "report_listener_accept_failed");
                    }
                }
            }
        }
    }
}

async fn handle_report_connection(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    controller: Arc<IntersectionController>,
    metrics: Arc<Metrics>,
) {
    let peer = addr.to_string();
    debug!(peer = %peer, "report_connection_accepted");

    let (read_half, mut write_half) = socket.into_split();
    let reader = BufReader::new(read_half);
    let mut lines = reader.lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = respond_to_line(&controller, &metrics, line).await;

        let mut payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!(peer = %peer, error = %e, "report_response_encode_failed");
                continue;
            }
        };
        payload.push('\n');

        if let Err(e) = write_half.write_all(payload.as_bytes()).await {
            debug!(peer = %peer, error = %e, "report_connection_write_failed");
            break;
        }
    }

    debug!(peer = %peer, "report_connection_closed");
}

/// Parse one protocol line and apply it, producing the answer to write back
async fn respond_to_line(
    controller: &IntersectionController,
    metrics: &Metrics,
    line: &str,
) -> ReportResponse {
    match serde_json::from_str::<ReportRequest>(line) {
        Ok(request) => process_request(controller, request).await,
        Err(e) => {
            metrics.record_report_rejected();
            warn!(line = %line, error = %e, "report_malformed");
            ReportResponse::rejected(format!("malformed report: {e}"))
        }
    }
}

async fn process_request(
    controller: &IntersectionController,
    request: ReportRequest,
) -> ReportResponse {
    match request {
        ReportRequest::Train { sensor, event } => {
            let outcome = controller.report_train(sensor, event).await;
            ReportResponse::train(outcome.state, outcome.dispatch.sent, outcome.dispatch.failed())
        }
        ReportRequest::Vehicle { plate, event } => {
            match controller.report_vehicle(&plate, event) {
                Ok(registered) => ReportResponse::vehicle(registered),
                Err(e) => ReportResponse::rejected(e.to_string()),
            }
        }
    }
}
