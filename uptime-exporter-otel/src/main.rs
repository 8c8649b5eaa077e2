//! OpenTelemetry exporter for uptime monitor heartbeats.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::watch;
use tracing::{error, info};

use uptime_exporter_otel::{ExporterConfig, HeartbeatFeed, PipelineManager};

/// OpenTelemetry exporter for uptime monitor heartbeats.
#[derive(Parser, Debug)]
#[command(name = "uptime-exporter-otel")]
#[command(about = "Export monitor heartbeats as OpenTelemetry gauges over OTLP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// OTLP endpoint (overrides config and OTEL_EXPORTER_OTLP_ENDPOINT).
    #[arg(long)]
    endpoint: Option<String>,

    /// File of line-delimited JSON events (defaults to stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Override endpoint from CLI, then fall back to the environment
    if let Some(endpoint) = args.endpoint {
        config.opentelemetry.endpoint = Some(endpoint);
    }
    config.opentelemetry = config.opentelemetry.with_env_endpoint();

    // Initialize logging
    config.logging = config.logging.with_level_override(args.log_level);
    uptime_common::init_tracing(&config.logging)?;

    info!("Starting uptime OpenTelemetry exporter");
    info!(
        endpoint = ?config.opentelemetry.endpoint(),
        protocol = ?config.opentelemetry.protocol,
        export_interval_secs = config.opentelemetry.export_interval_secs,
        "Configuration loaded"
    );

    // Create the metric pipeline
    let pipeline = PipelineManager::new();
    let gauges = pipeline.init(&config.opentelemetry);

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    // Start feed
    let feed = HeartbeatFeed::new(gauges);
    let mut feed_task = tokio::spawn(feed.run(reader, shutdown_rx));

    // Wait for end of input or a shutdown signal
    let feed_result = tokio::select! {
        result = &mut feed_task => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            None
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down...");
            None
        }
    };

    // Signal shutdown and wait for the feed to finish
    let feed_result = match feed_result {
        Some(result) => Some(result),
        None => {
            shutdown_tx.send(true)?;
            tokio::time::timeout(Duration::from_secs(5), feed_task).await.ok()
        }
    };

    let feed_stats = match feed_result {
        Some(Ok(Ok(stats))) => Some(stats),
        Some(Ok(Err(e))) => {
            error!("Feed error: {}", e);
            None
        }
        Some(Err(e)) => {
            error!("Feed task failed: {}", e);
            None
        }
        None => None,
    };

    // Flush and stop export
    pipeline.shutdown().await;

    // Print final stats
    let stats = pipeline.stats();
    info!(
        observations_recorded = stats.observations_recorded,
        observations_rejected = stats.observations_rejected,
        "Final statistics"
    );
    if let Some(feed_stats) = feed_stats {
        info!(
            events_received = feed_stats.events_received,
            lines_rejected = feed_stats.lines_rejected,
            unknown_monitors = feed_stats.unknown_monitors,
            monitors_registered = feed_stats.monitors_registered,
            "Feed statistics"
        );
    }

    info!("Exporter stopped");
    Ok(())
}

async fn sigterm() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
