//! Gauge instruments recorded for every monitor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Gauge, Meter};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::trace;

pub const CERT_DAYS_REMAINING: &str = "monitor_cert_days_remaining";
pub const CERT_IS_VALID: &str = "monitor_cert_is_valid";
pub const RESPONSE_TIME: &str = "monitor_response_time";
pub const STATUS: &str = "monitor_status";

/// Errors raised while recording an observation.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("refusing to record non-finite value {value} on {gauge}")]
    NonFinite { gauge: &'static str, value: f64 },
}

/// Counters describing what the gauges have seen.
#[derive(Debug, Clone, Default)]
pub struct RecordingStats {
    pub observations_recorded: u64,
    pub observations_rejected: u64,
}

/// Capability to record the four monitor gauges.
///
/// Handed out by the pipeline once it decides whether export is active.
pub trait MonitorGauges: Send + Sync {
    /// Days until the certificate expires.
    fn record_cert_days_remaining(
        &self,
        days: f64,
        attributes: &[KeyValue],
    ) -> Result<(), RecordError>;

    /// 1 if the certificate is valid, 0 otherwise.
    fn record_cert_valid(&self, valid: f64, attributes: &[KeyValue]) -> Result<(), RecordError>;

    /// Response time in milliseconds, -1 when unavailable.
    fn record_response_time(&self, ms: f64, attributes: &[KeyValue]) -> Result<(), RecordError>;

    /// Numeric monitor status.
    fn record_status(&self, status: f64, attributes: &[KeyValue]) -> Result<(), RecordError>;
}

/// Shareable gauge capability.
pub type SharedGauges = Arc<dyn MonitorGauges>;

/// Gauges backed by an OpenTelemetry meter.
///
/// Observations are dropped without counting once `exporting` is cleared.
pub struct OtelGauges {
    cert_days_remaining: Gauge<f64>,
    cert_is_valid: Gauge<f64>,
    response_time: Gauge<f64>,
    status: Gauge<f64>,
    stats: Arc<RwLock<RecordingStats>>,
    exporting: Arc<AtomicBool>,
}

impl OtelGauges {
    /// Register the gauges on a meter.
    pub fn new(
        meter: &Meter,
        stats: Arc<RwLock<RecordingStats>>,
        exporting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cert_days_remaining: meter
                .f64_gauge(CERT_DAYS_REMAINING)
                .with_description("The number of days remaining until the certificate expires")
                .build(),
            cert_is_valid: meter
                .f64_gauge(CERT_IS_VALID)
                .with_description("Is the certificate still valid? (1 = Yes, 0 = No)")
                .build(),
            response_time: meter
                .f64_gauge(RESPONSE_TIME)
                .with_description("Monitor Response Time (ms), -1 when unavailable")
                .build(),
            status: meter
                .f64_gauge(STATUS)
                .with_description("Monitor Status (1 = UP, 0 = DOWN, 2 = PENDING, 3 = MAINTENANCE)")
                .build(),
            stats,
            exporting,
        }
    }

    fn record(
        &self,
        gauge: &Gauge<f64>,
        name: &'static str,
        value: f64,
        attributes: &[KeyValue],
    ) -> Result<(), RecordError> {
        if !self.exporting.load(Ordering::Acquire) {
            trace!(metric = name, "Export stopped, dropping observation");
            return Ok(());
        }

        if !value.is_finite() {
            self.stats.write().observations_rejected += 1;
            return Err(RecordError::NonFinite { gauge: name, value });
        }

        gauge.record(value, attributes);
        trace!(metric = name, value = value, "Recorded gauge");

        self.stats.write().observations_recorded += 1;
        Ok(())
    }
}

impl MonitorGauges for OtelGauges {
    fn record_cert_days_remaining(
        &self,
        days: f64,
        attributes: &[KeyValue],
    ) -> Result<(), RecordError> {
        self.record(&self.cert_days_remaining, CERT_DAYS_REMAINING, days, attributes)
    }

    fn record_cert_valid(&self, valid: f64, attributes: &[KeyValue]) -> Result<(), RecordError> {
        self.record(&self.cert_is_valid, CERT_IS_VALID, valid, attributes)
    }

    fn record_response_time(&self, ms: f64, attributes: &[KeyValue]) -> Result<(), RecordError> {
        self.record(&self.response_time, RESPONSE_TIME, ms, attributes)
    }

    fn record_status(&self, status: f64, attributes: &[KeyValue]) -> Result<(), RecordError> {
        self.record(&self.status, STATUS, status, attributes)
    }
}

/// Gauges used while export is disabled. Every observation is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGauges;

impl MonitorGauges for NoopGauges {
    fn record_cert_days_remaining(&self, _: f64, _: &[KeyValue]) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_cert_valid(&self, _: f64, _: &[KeyValue]) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_response_time(&self, _: f64, _: &[KeyValue]) -> Result<(), RecordError> {
        Ok(())
    }

    fn record_status(&self, _: f64, _: &[KeyValue]) -> Result<(), RecordError> {
        Ok(())
    }
}
