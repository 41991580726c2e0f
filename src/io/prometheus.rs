//! Prometheus metrics HTTP endpoint
//!
//! Exposes crossing metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with crossing label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    crossing: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{crossing=\"{crossing}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    crossing: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(
            output,
            "{name}_bucket{{crossing=\"{crossing}\",le=\"{bound}\"}} {cumulative}"
        );
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{crossing=\"{crossing}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{crossing=\"{crossing}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{crossing=\"{crossing}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, crossing_id: &str) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(8192);

    write_report_metrics(&mut output, crossing_id, &summary);
    write_latency_metrics(&mut output, crossing_id, &summary);
    write_notification_metrics(&mut output, crossing_id, &summary);
    write_state_metrics(&mut output, crossing_id, &summary);

    output
}

fn write_report_metrics(output: &mut String, crossing: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "crossing_reports_total",
        "Total reports handled",
        MetricType::Counter,
        crossing,
        summary.reports_total,
    );
    let _ = writeln!(output, "# HELP crossing_reports_per_sec Reports handled per second");
    let _ = writeln!(output, "# TYPE crossing_reports_per_sec gauge");
    let _ = writeln!(
        output,
        "crossing_reports_per_sec{{crossing=\"{crossing}\"}} {:.2}",
        summary.reports_per_sec
    );

    write_metric(
        output,
        "crossing_train_events_total",
        "Train reports applied to the state machine",
        MetricType::Counter,
        crossing,
        summary.train_events_total,
    );
    write_metric(
        output,
        "crossing_vehicle_reports_total",
        "Vehicle reports applied to the registry",
        MetricType::Counter,
        crossing,
        summary.vehicle_reports_total,
    );
    write_metric(
        output,
        "crossing_duplicate_registrations_total",
        "Vehicle arrivals for plates already registered",
        MetricType::Counter,
        crossing,
        summary.duplicate_registrations_total,
    );
    write_metric(
        output,
        "crossing_reports_rejected_total",
        "Reports rejected as invalid",
        MetricType::Counter,
        crossing,
        summary.reports_rejected_total,
    );
}

fn write_latency_metrics(output: &mut String, crossing: &str, summary: &MetricsSummary) {
    write_histogram(
        output,
        "crossing_report_latency_us",
        "Report handling latency in microseconds",
        crossing,
        &summary.lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.avg_report_latency_us,
    );

    write_metric(
        output,
        "crossing_report_latency_p50_us",
        "50th percentile report latency",
        MetricType::Gauge,
        crossing,
        summary.lat_p50_us,
    );
    write_metric(
        output,
        "crossing_report_latency_p95_us",
        "95th percentile report latency",
        MetricType::Gauge,
        crossing,
        summary.lat_p95_us,
    );
    write_metric(
        output,
        "crossing_report_latency_p99_us",
        "99th percentile report latency",
        MetricType::Gauge,
        crossing,
        summary.lat_p99_us,
    );
}

fn write_notification_metrics(output: &mut String, crossing: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "crossing_notifications_sent_total",
        "Notifications accepted by the communicator",
        MetricType::Counter,
        crossing,
        summary.notifications_sent_total,
    );
    write_metric(
        output,
        "crossing_notifications_failed_total",
        "Notifications that failed delivery",
        MetricType::Counter,
        crossing,
        summary.notifications_failed,
    );

    let _ = writeln!(
        output,
        "# HELP crossing_notifications_level_sent_total Sent notifications by level"
    );
    let _ = writeln!(output, "# TYPE crossing_notifications_level_sent_total counter");
    for (level, count) in [
        ("pass_slowly", summary.pass_slowly_sent_total),
        ("stop", summary.stop_sent_total),
        ("look_around", summary.look_around_sent_total),
    ] {
        let _ = writeln!(
            output,
            "crossing_notifications_level_sent_total{{crossing=\"{crossing}\",level=\"{level}\"}} {count}"
        );
    }

    write_histogram(
        output,
        "crossing_delivery_latency_us",
        "Notification delivery latency in microseconds",
        crossing,
        &summary.delivery_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.delivery_avg_us,
    );
    write_metric(
        output,
        "crossing_delivery_latency_p99_us",
        "99th percentile delivery latency",
        MetricType::Gauge,
        crossing,
        summary.delivery_p99_us,
    );
    write_metric(
        output,
        "crossing_delivery_latency_max_us",
        "Maximum delivery latency",
        MetricType::Gauge,
        crossing,
        summary.delivery_max_us,
    );
}

fn write_state_metrics(output: &mut String, crossing: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "crossing_train_state",
        "Current fused train state (0=idle, 1=registered, 2=arriving)",
        MetricType::Gauge,
        crossing,
        summary.train_state,
    );
    write_metric(
        output,
        "crossing_vehicles_present",
        "Vehicles currently registered at the crossing",
        MetricType::Gauge,
        crossing,
        summary.vehicles_present,
    );
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    crossing_id: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &crossing_id);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    crossing_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let crossing_id = Arc::new(crossing_id);

    info!(port = %port, crossing = %crossing_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let crossing_id = crossing_id.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let crossing_id = crossing_id.clone();
                                async move { handle_request(req, metrics, crossing_id).await }
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
