//! Configuration for the OpenTelemetry exporter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uptime_common::config::{LoggingConfig, load_config, parse_config};

/// Environment variable holding the OTLP endpoint.
pub const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Path appended to the endpoint for OTLP/HTTP metric submission.
pub const METRICS_PATH: &str = "/v1/metrics";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] uptime_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// OpenTelemetry exporter settings.
    #[serde(default)]
    pub opentelemetry: OtelConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenTelemetry OTLP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtelConfig {
    /// OTLP endpoint (e.g., "http://localhost:4318"). Export is disabled when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Protocol: "http" or "grpc".
    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Headers to include in OTLP requests (e.g., for authentication).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Export interval in seconds.
    #[serde(default = "default_export_interval")]
    pub export_interval_secs: u64,

    /// Export timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Resource attributes to add to all metrics.
    #[serde(default)]
    pub resource: HashMap<String, String>,

    /// Service version for the OTEL resource (defaults to the crate version).
    #[serde(default)]
    pub service_version: Option<String>,
}

fn default_export_interval() -> u64 {
    15
}

fn default_timeout() -> u64 {
    10
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: OtlpProtocol::default(),
            headers: HashMap::new(),
            export_interval_secs: default_export_interval(),
            timeout_secs: default_timeout(),
            resource: HashMap::new(),
            service_version: None,
        }
    }
}

impl OtelConfig {
    /// Get export interval as Duration.
    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }

    /// Get timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fill in the endpoint from `OTEL_EXPORTER_OTLP_ENDPOINT` if none is configured.
    pub fn with_env_endpoint(self) -> Self {
        let from_env = std::env::var(ENDPOINT_ENV).ok();
        self.with_endpoint_fallback(from_env)
    }

    /// Fill in the endpoint from a fallback value if none is configured.
    ///
    /// Blank values count as absent.
    pub fn with_endpoint_fallback(mut self, fallback: Option<String>) -> Self {
        if self.endpoint().is_none() {
            self.endpoint = fallback.filter(|e| !e.trim().is_empty());
        }
        self
    }

    /// The configured endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// URL metrics are submitted to.
    ///
    /// OTLP/HTTP takes the full signal URL, gRPC takes the bare endpoint.
    pub fn metrics_url(&self) -> Option<String> {
        let endpoint = self.endpoint()?;
        match self.protocol {
            OtlpProtocol::Http => Some(format!(
                "{}{}",
                endpoint.trim_end_matches('/'),
                METRICS_PATH
            )),
            OtlpProtocol::Grpc => Some(endpoint.to_string()),
        }
    }
}

/// OTLP protocol selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// HTTP/protobuf protocol (port 4318).
    #[default]
    Http,
    /// gRPC protocol (port 4317).
    Grpc,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.opentelemetry.endpoint
            && endpoint.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "OTLP endpoint cannot be empty".to_string(),
            ));
        }

        if self.opentelemetry.export_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "export_interval_secs must be > 0".to_string(),
            ));
        }

        if self.opentelemetry.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
