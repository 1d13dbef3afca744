use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One detected fact about a host.
///
/// Serialized field names (`id`, `value`, `summary`, `port`, `protocol`,
/// `severity`, `references`, `items`) are stable across renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule-scoped identifier (e.g., "smb_anon", "vuln_CVE_2021_44228").
    pub id: String,
    /// The detected value (version string, cipher name, count, ...).
    pub value: Value,
    /// Human-readable description of the finding.
    pub summary: String,
    /// Port the finding was observed on; `null` for host-level findings.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    pub severity: Severity,
    /// Advisory URLs and similar references.
    #[serde(default)]
    pub references: Vec<String>,
    /// Enumerated sub-items (database names, shares, disallowed paths).
    #[serde(default)]
    pub items: Vec<String>,
}

impl Finding {
    /// A host-level finding with no references or items.
    pub fn new(
        id: impl Into<String>,
        value: impl Into<Value>,
        summary: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            summary: summary.into(),
            port: None,
            protocol: None,
            severity,
            references: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Pin the finding to the port/protocol it was observed on.
    pub fn at(mut self, endpoint: Endpoint) -> Self {
        self.port = Some(endpoint.port);
        self.protocol = Some(endpoint.protocol);
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    pub fn has_port(&self) -> bool {
        self.port.is_some()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        Some(Endpoint {
            port: self.port?,
            protocol: self.protocol.clone().unwrap_or_default(),
        })
    }
}

/// Port and transport protocol of a service probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub port: u16,
    pub protocol: String,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Highest first, the order used for the console key.
    pub const DESCENDING: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Numeric weight. Agrees with the derived ordering; never used as a score.
    pub fn weight(self) -> u32 {
        match self {
            Self::Info => 1,
            Self::Low => 3,
            Self::Medium => 5,
            Self::High => 7,
            Self::Critical => 10,
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
