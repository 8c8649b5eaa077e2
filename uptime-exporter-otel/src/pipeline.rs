//! OTLP metric pipeline setup and lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::KeyValue;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_otlp::{MetricExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::reader::MetricReader;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::{OtelConfig, OtlpProtocol};
use crate::gauges::{NoopGauges, OtelGauges, RecordingStats, SharedGauges};

/// Service name reported in the resource, also used as the meter name.
pub const SERVICE_NAME: &str = "uptime-kuma";

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// `init` has not run yet.
    Uninitialized,
    /// No endpoint or reader was configured; nothing is exported.
    Disabled,
    /// Metrics are exported periodically.
    Active,
    /// `shutdown` has run.
    Terminated,
}

enum Inner {
    Uninitialized,
    Disabled,
    Active {
        provider: SdkMeterProvider,
        gauges: SharedGauges,
    },
    Terminated,
}

impl Inner {
    fn state(&self) -> PipelineState {
        match self {
            Inner::Uninitialized => PipelineState::Uninitialized,
            Inner::Disabled => PipelineState::Disabled,
            Inner::Active { .. } => PipelineState::Active,
            Inner::Terminated => PipelineState::Terminated,
        }
    }

    fn gauges(&self) -> SharedGauges {
        match self {
            Inner::Active { gauges, .. } => gauges.clone(),
            _ => Arc::new(NoopGauges),
        }
    }
}

/// Build resource attributes from configuration.
pub fn build_resource_attributes(
    service_version: Option<&str>,
    extra_attrs: &HashMap<String, String>,
) -> Vec<KeyValue> {
    let mut attrs = Vec::with_capacity(2 + extra_attrs.len());

    attrs.push(KeyValue::new("service.name", SERVICE_NAME));
    attrs.push(KeyValue::new(
        "service.version",
        service_version
            .unwrap_or(env!("CARGO_PKG_VERSION"))
            .to_string(),
    ));

    for (k, v) in extra_attrs {
        attrs.push(KeyValue::new(k.clone(), v.clone()));
    }

    attrs
}

/// Owns the metric export pipeline for the lifetime of the process.
///
/// Created once by the composition root. `init` decides whether export is
/// active and hands out the gauge capability used by every
/// [`MonitorRecorder`](crate::recorder::MonitorRecorder); `shutdown` flushes
/// and stops export.
pub struct PipelineManager {
    inner: Mutex<Inner>,
    stats: Arc<RwLock<RecordingStats>>,
    exporting: Arc<AtomicBool>,
}

impl PipelineManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::Uninitialized),
            stats: Arc::new(RwLock::new(RecordingStats::default())),
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Initialize export from configuration.
    ///
    /// Without an endpoint the pipeline is disabled and no-op gauges are
    /// returned. Never fails: exporter setup errors also disable export.
    pub fn init(&self, config: &OtelConfig) -> SharedGauges {
        let mut inner = self.inner.lock();
        if let Some(gauges) = Self::already_initialized(&inner) {
            return gauges;
        }

        let Some(url) = config.metrics_url() else {
            info!(
                component = "opentelemetry",
                "OTEL_EXPORTER_OTLP_ENDPOINT not set, OpenTelemetry metrics disabled."
            );
            *inner = Inner::Disabled;
            return inner.gauges();
        };

        info!(
            component = "opentelemetry",
            url = %url,
            protocol = ?config.protocol,
            "Initializing OpenTelemetry"
        );

        let exporter = match build_metric_exporter(config, &url) {
            Ok(exporter) => exporter,
            Err(e) => {
                error!(
                    component = "opentelemetry",
                    error = %e,
                    "Failed to create metric exporter, OpenTelemetry metrics disabled"
                );
                *inner = Inner::Disabled;
                return inner.gauges();
            }
        };

        let reader = PeriodicReader::builder(exporter)
            .with_interval(config.export_interval())
            .build();

        *inner = self.activate(config, reader);
        inner.gauges()
    }

    /// Initialize export with a pre-built reader, bypassing endpoint detection.
    pub fn init_with_reader<R: MetricReader>(
        &self,
        config: &OtelConfig,
        reader: R,
    ) -> SharedGauges {
        let mut inner = self.inner.lock();
        if let Some(gauges) = Self::already_initialized(&inner) {
            return gauges;
        }

        info!(component = "opentelemetry", "Initializing OpenTelemetry with injected reader");
        *inner = self.activate(config, reader);
        inner.gauges()
    }

    fn already_initialized(inner: &Inner) -> Option<SharedGauges> {
        match inner {
            Inner::Uninitialized => None,
            other => {
                warn!(
                    component = "opentelemetry",
                    state = ?other.state(),
                    "OpenTelemetry already initialized"
                );
                Some(other.gauges())
            }
        }
    }

    fn activate<R: MetricReader>(&self, config: &OtelConfig, reader: R) -> Inner {
        let resource = Resource::builder()
            .with_attributes(build_resource_attributes(
                config.service_version.as_deref(),
                &config.resource,
            ))
            .build();

        let provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build();

        let meter = provider.meter(SERVICE_NAME);
        self.exporting.store(true, Ordering::Release);
        let gauges: SharedGauges = Arc::new(OtelGauges::new(
            &meter,
            self.stats.clone(),
            self.exporting.clone(),
        ));

        info!(component = "opentelemetry", "OpenTelemetry started");
        Inner::Active { provider, gauges }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.inner.lock().state()
    }

    /// Gauge capability for the current state; no-op unless active.
    pub fn gauges(&self) -> SharedGauges {
        self.inner.lock().gauges()
    }

    /// Get current recording statistics.
    pub fn stats(&self) -> RecordingStats {
        self.stats.read().clone()
    }

    /// Export everything recorded so far without waiting for the next interval.
    pub fn force_flush(&self) {
        let provider = match &*self.inner.lock() {
            Inner::Active { provider, .. } => provider.clone(),
            _ => return,
        };

        if let Err(e) = provider.force_flush() {
            warn!(component = "opentelemetry", "Error flushing meter provider: {:?}", e);
        }
    }

    /// Flush pending metrics and stop export.
    ///
    /// Safe to call before `init`, when disabled, and more than once.
    /// Gauges handed out earlier stop recording. Outside a Tokio runtime the
    /// provider is shut down on the calling thread.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.inner.lock(), Inner::Terminated);
        self.exporting.store(false, Ordering::Release);

        let Inner::Active { provider, .. } = previous else {
            return;
        };

        info!(component = "opentelemetry", "Shutting down OpenTelemetry");

        let result = match tokio::runtime::Handle::try_current() {
            Ok(handle) => match handle.spawn_blocking(move || provider.shutdown()).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        component = "opentelemetry",
                        "Meter provider shutdown task failed: {}", e
                    );
                    return;
                }
            },
            Err(_) => provider.shutdown(),
        };

        match result {
            Ok(()) => info!(component = "opentelemetry", "OpenTelemetry shutdown complete"),
            Err(e) => warn!(
                component = "opentelemetry",
                "Error shutting down meter provider: {:?}", e
            ),
        }
    }
}

impl Default for PipelineManager {
    fn default() -> Self {
        Self::new()
    }
}

fn build_metric_exporter(config: &OtelConfig, url: &str) -> anyhow::Result<MetricExporter> {
    let exporter = match config.protocol {
        OtlpProtocol::Http => MetricExporter::builder()
            .with_http()
            .with_endpoint(url)
            .with_timeout(config.timeout())
            .with_headers(config.headers.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP metric exporter: {}", e))?,
        OtlpProtocol::Grpc => {
            if !config.headers.is_empty() {
                warn!(
                    component = "opentelemetry",
                    "Custom headers are only applied to the HTTP protocol"
                );
            }
            MetricExporter::builder()
                .with_tonic()
                .with_endpoint(url)
                .with_timeout(config.timeout())
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create gRPC metric exporter: {}", e))?
        }
    };

    Ok(exporter)
}
