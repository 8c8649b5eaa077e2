//! OpenTelemetry metrics for uptime monitor heartbeats.
//!
//! This crate turns heartbeat and TLS inspection results from a monitor loop
//! into four gauges exported via OTLP (HTTP or gRPC).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Monitor Loop   │────>│ MonitorRecorder │────>│  OTLP Endpoint  │
//! │  (heartbeats)   │     │ (4 gauges/15s)  │     │  (Collector)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Exported Gauges
//!
//! - `monitor_status`: 1 = UP, 0 = DOWN, 2 = PENDING, 3 = MAINTENANCE
//! - `monitor_response_time`: milliseconds, `-1` when unavailable
//! - `monitor_cert_is_valid`: 1 = valid, 0 = invalid
//! - `monitor_cert_days_remaining`: days until the certificate expires
//!
//! # Usage
//!
//! ```ignore
//! let pipeline = PipelineManager::new();
//! let gauges = pipeline.init(&OtelConfig::default().with_env_endpoint());
//!
//! let recorder = MonitorRecorder::new(&entity, &tags, gauges);
//! recorder.update(Some(&heartbeat), tls.as_ref());
//!
//! pipeline.shutdown().await;
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod feed;
pub mod gauges;
pub mod labels;
pub mod pipeline;
pub mod recorder;

pub use config::{ExporterConfig, OtelConfig};
pub use feed::{FeedEvent, HeartbeatFeed};
pub use gauges::{MonitorGauges, NoopGauges, SharedGauges};
pub use labels::{AttributeSet, sanitize};
pub use pipeline::{PipelineManager, PipelineState};
pub use recorder::MonitorRecorder;
