//! Crossing Central - decision core for a level crossing safety system
//!
//! Fuses train reports from two sensor feeds with vehicle presence reports
//! and notifies road vehicles through the vehicle communicator.
//!
//! Module structure:
//! - `domain/` - Core business types (events, states, notifications, wire DTOs)
//! - `io/` - External interfaces (report listener, communicator, Prometheus)
//! - `services/` - Decision logic (controller, train state, registry, policy)
//! - `infra/` - Infrastructure (config, metrics)

use clap::Parser;
use crossing_central::infra::{Config, Metrics};
use crossing_central::io::{start_report_listener, HttpCommunicator, ReportListenerConfig};
use crossing_central::services::{Dispatcher, IntersectionController};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Crossing Central - level crossing decision core
#[derive(Parser, Debug)]
#[command(name = "crossing-central", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git_hash = %env!("GIT_HASH"),
        "crossing-central starting"
    );

    // Parse command line arguments using clap
    let args = Args::parse();

    // Load configuration from TOML file
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        crossing_id = %config.crossing_id(),
        listener_bind = %config.listener_bind_address(),
        listener_port = %config.listener_port(),
        listener_enabled = %config.listener_enabled(),
        communicator_timeout_ms = %config.communicator_timeout_ms(),
        metrics_interval_secs = %config.metrics_interval_secs(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create shared components
    let metrics = Arc::new(Metrics::new());
    let communicator = Arc::new(HttpCommunicator::new(&config));
    info!(url = %communicator.url(), "communicator_ready");

    let dispatcher = Dispatcher::new(communicator, metrics.clone());
    let controller = Arc::new(IntersectionController::new(dispatcher, metrics.clone()));

    // Start report TCP listener
    let listener_config = ReportListenerConfig {
        bind_address: config.listener_bind_address().to_string(),
        port: config.listener_port(),
        enabled: config.listener_enabled(),
    };
    let listener_controller = controller.clone();
    let listener_metrics = metrics.clone();
    let listener_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = start_report_listener(
            listener_config,
            listener_controller,
            listener_metrics,
            listener_shutdown,
        )
        .await
        {
            tracing::error!(error = %e, "Report listener error");
        }
    });

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_crossing = config.crossing_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = crossing_central::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_crossing,
                prom_shutdown,
            )
            .await
            {
                tracing::error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let summary = metrics_clone.report();
            summary.log();
        }
    });

    info!(crossing_id = %config.crossing_id(), "controller_started");

    // Block until Ctrl+C, then tell every listener to wind down
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(true);

    info!("crossing-central shutdown complete");
    Ok(())
}
