use serde::{Deserialize, Serialize};

/// Identity of a monitored entity, as known to the monitor loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredEntity {
    /// Monitor identifier.
    pub id: i64,

    /// Display name.
    pub name: String,

    /// Monitor kind (e.g., "http", "port", "dns").
    #[serde(rename = "type")]
    pub monitor_type: String,

    /// Target URL, for URL-based monitors.
    #[serde(default)]
    pub url: Option<String>,

    /// Target hostname, for host-based monitors.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Target port, for port-based monitors.
    #[serde(default)]
    pub port: Option<u16>,
}

impl MonitoredEntity {
    /// Create an entity with only the mandatory identity fields.
    pub fn new(id: i64, name: impl Into<String>, monitor_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            monitor_type: monitor_type.into(),
            url: None,
            hostname: None,
            port: None,
        }
    }

    /// Set the target URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the target hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the target port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// A free-form user tag attached to a monitor.
///
/// Names and values are unsanitized and the same name may appear several
/// times with different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Tag {
    /// Create a tag with a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a tag without a value.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Monitor status reported by a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MonitorStatus {
    Down = 0,
    Up = 1,
    Pending = 2,
    Maintenance = 3,
}

impl MonitorStatus {
    /// Numeric value recorded by the status gauge.
    pub fn as_f64(self) -> f64 {
        f64::from(u8::from(self))
    }

    /// Get the lowercase status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Down => "down",
            MonitorStatus::Up => "up",
            MonitorStatus::Pending => "pending",
            MonitorStatus::Maintenance => "maintenance",
        }
    }
}

impl From<MonitorStatus> for u8 {
    fn from(status: MonitorStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for MonitorStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MonitorStatus::Down),
            1 => Ok(MonitorStatus::Up),
            2 => Ok(MonitorStatus::Pending),
            3 => Ok(MonitorStatus::Maintenance),
            other => Err(format!("unknown monitor status: {}", other)),
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single health check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Monitor status at the time of the check.
    pub status: MonitorStatus,

    /// Response time in milliseconds, if the check measured one.
    #[serde(default)]
    pub ping: Option<f64>,
}

impl Heartbeat {
    /// Create a heartbeat without timing data.
    pub fn new(status: MonitorStatus) -> Self {
        Self { status, ping: None }
    }

    /// Set the measured response time.
    pub fn with_ping(mut self, ping: f64) -> Self {
        self.ping = Some(ping);
        self
    }
}

/// TLS inspection result for a monitored endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsInfo {
    /// Whether the certificate chain validated.
    pub valid: bool,

    /// Leaf certificate details, when a certificate was retrieved.
    #[serde(default)]
    pub cert_info: Option<CertInfo>,
}

/// Leaf certificate details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertInfo {
    /// Days until the certificate expires (negative once expired).
    pub days_remaining: i64,
}
