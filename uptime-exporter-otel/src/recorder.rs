//! Per-monitor metric recording.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{debug, error, trace};
use uptime_common::monitor::{Heartbeat, MonitoredEntity, Tag, TlsInfo};

use crate::gauges::{
    CERT_DAYS_REMAINING, CERT_IS_VALID, RESPONSE_TIME, RecordError, STATUS, SharedGauges,
};
use crate::labels::AttributeSet;

/// Response time recorded when a heartbeat carries no timing data.
pub const RESPONSE_TIME_UNAVAILABLE: f64 = -1.0;

/// Records heartbeat and TLS gauges for one monitored entity.
///
/// The attribute set is computed once at construction and never changes.
pub struct MonitorRecorder {
    monitor_id: i64,
    labels: AttributeSet,
    attributes: Arc<[KeyValue]>,
    gauges: SharedGauges,
}

impl MonitorRecorder {
    /// Create a recorder for an entity and its user tags.
    pub fn new(entity: &MonitoredEntity, tags: &[Tag], gauges: SharedGauges) -> Self {
        let labels = AttributeSet::build(entity, tags);
        let attributes: Arc<[KeyValue]> = labels.to_key_values().into();

        debug!(
            monitor_id = entity.id,
            attributes = attributes.len(),
            "Monitor recorder created"
        );

        Self {
            monitor_id: entity.id,
            labels,
            attributes,
            gauges,
        }
    }

    /// Identifier of the monitored entity.
    pub fn monitor_id(&self) -> i64 {
        self.monitor_id
    }

    /// The frozen attribute set.
    pub fn labels(&self) -> &AttributeSet {
        &self.labels
    }

    /// The attributes attached to every observation.
    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }

    /// Record the gauges for a heartbeat and/or TLS result.
    ///
    /// Each observation is recorded independently: a failure is logged and
    /// the remaining observations still run.
    pub fn update(&self, heartbeat: Option<&Heartbeat>, tls: Option<&TlsInfo>) {
        if let Some(tls) = tls {
            let valid = if tls.valid { 1.0 } else { 0.0 };
            self.isolate(CERT_IS_VALID, || {
                self.gauges.record_cert_valid(valid, &self.attributes)
            });

            if let Some(cert) = &tls.cert_info {
                self.isolate(CERT_DAYS_REMAINING, || {
                    self.gauges
                        .record_cert_days_remaining(cert.days_remaining as f64, &self.attributes)
                });
            }
        }

        if let Some(heartbeat) = heartbeat {
            trace!(
                monitor_id = self.monitor_id,
                status = %heartbeat.status,
                ping = ?heartbeat.ping,
                "Recording heartbeat"
            );

            self.isolate(STATUS, || {
                self.gauges
                    .record_status(heartbeat.status.as_f64(), &self.attributes)
            });

            // A measured 0 ms is a real value; only a missing ping is unavailable
            let ping = heartbeat.ping.unwrap_or(RESPONSE_TIME_UNAVAILABLE);
            self.isolate(RESPONSE_TIME, || {
                self.gauges.record_response_time(ping, &self.attributes)
            });
        }
    }

    /// Stop recording for this monitor.
    ///
    /// Nothing is deleted on the backend: with push-based export the series
    /// stops being refreshed and ages out under the backend's own retention.
    pub fn remove(self) {
        debug!(monitor_id = self.monitor_id, "Monitor recorder removed");
    }

    fn isolate(&self, gauge: &'static str, record: impl FnOnce() -> Result<(), RecordError>) {
        if let Err(e) = record() {
            error!(
                component = "metrics",
                monitor_id = self.monitor_id,
                gauge = gauge,
                error = %e,
                "Caught error while recording metric"
            );
        }
    }
}
