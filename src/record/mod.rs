//! Host records as returned by the remote intelligence service.
//!
//! The outer document is typed (identifier, OS, ports, hostnames, probes).
//! Each service probe keeps its protocol sub-documents as raw JSON because
//! their shape varies per probe; detectors read them through the lenient
//! accessors in [`fields`] and treat absent keys as "check not applicable".

pub mod fields;

use std::borrow::Borrow;
use std::net::IpAddr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identifies one host (its IP address). Used as the key everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostIdentifier(String);

impl HostIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HostIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for HostIdentifier {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl From<&str> for HostIdentifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HostIdentifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for HostIdentifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The retrieved document describing one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(rename = "ip_str")]
    pub ip: HostIdentifier,
    #[serde(default, deserialize_with = "fields::lenient")]
    pub os: Option<String>,
    /// Timestamp of the last crawl, e.g. `2022-03-01T10:11:12.123456`.
    #[serde(default, deserialize_with = "fields::lenient")]
    pub last_update: Option<String>,
    #[serde(default, deserialize_with = "fields::lenient_seq")]
    pub ports: Vec<u16>,
    #[serde(default, deserialize_with = "fields::lenient_seq")]
    pub hostnames: Vec<String>,
    /// Known vulnerability ids. The service sends either a list of ids or a
    /// map keyed by id; both collapse to the id list.
    #[serde(default, deserialize_with = "vuln_ids")]
    pub vulns: Vec<String>,
    /// One entry per service probe (open port / protocol). Entries that
    /// are not objects are dropped.
    #[serde(default, deserialize_with = "fields::lenient_seq")]
    pub data: Vec<ServiceProbe>,
}

impl HostRecord {
    pub fn identifier(&self) -> &HostIdentifier {
        &self.ip
    }

    /// Parse a record from a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Probes carrying the named protocol sub-document.
    pub fn probes_with<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a ServiceProbe> {
        self.data.iter().filter(move |p| p.module(module).is_some())
    }
}

/// One service observation: a port, its transport, and protocol documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProbe {
    #[serde(default, deserialize_with = "fields::lenient")]
    pub port: u16,
    #[serde(default = "default_transport", deserialize_with = "lenient_transport")]
    pub transport: String,
    /// Everything else: banner fields (`product`, `version`) and protocol
    /// documents (`ssl`, `ssh`, `http`, `smb`, `mongodb`, ...).
    #[serde(flatten)]
    pub modules: Map<String, Value>,
}

fn default_transport() -> String {
    "tcp".into()
}

fn lenient_transport<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let transport: Option<String> = fields::lenient(deserializer)?;
    Ok(transport.unwrap_or_else(default_transport))
}

impl ServiceProbe {
    pub fn new(port: u16, transport: impl Into<String>) -> Self {
        Self {
            port,
            transport: transport.into(),
            modules: Map::new(),
        }
    }

    /// Attach a protocol document or banner field.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.modules.insert(key.into(), value);
        self
    }

    /// A named protocol sub-document, ignoring JSON nulls.
    pub fn module(&self, name: &str) -> Option<&Value> {
        self.modules.get(name).filter(|v| !v.is_null())
    }

    /// Banner product name (e.g. `PostgreSQL`).
    pub fn product(&self) -> Option<&str> {
        self.modules.get("product").and_then(Value::as_str)
    }

    /// Banner version string.
    pub fn version(&self) -> Option<&str> {
        self.modules.get("version").and_then(Value::as_str)
    }

    pub fn endpoint(&self) -> crate::rules::Endpoint {
        crate::rules::Endpoint {
            port: self.port,
            protocol: self.transport.clone(),
        }
    }
}

fn vuln_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(ids)) => ids
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(map)) => map.into_iter().map(|(k, _)| k).collect(),
        _ => Vec::new(),
    })
}
