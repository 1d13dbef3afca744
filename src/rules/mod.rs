pub mod builtin;
pub mod finding;
pub mod output_host;
pub mod pipeline;
pub mod registry;
pub mod score;

use thiserror::Error;

use crate::record::HostRecord;

pub use finding::{Endpoint, Finding, Severity};
pub use output_host::{OutputHost, RuleFailure};
pub use pipeline::Pipeline;
pub use registry::{RuleInfo, RuleRegistry};
pub use score::{map_severity, Cvss, Points, SeverityError};

/// A detector evaluates one category of condition against a host record.
///
/// Detectors are stateless: one instance is shared across hosts and threads.
/// Missing or mistyped fields skip the affected check; an `Err` is reserved
/// for corrupt upstream data and aborts only this detector on this host.
pub trait Detector: Send + Sync {
    /// Registry name (e.g., "vulns").
    fn name(&self) -> &'static str;

    /// One-line description for `list-rules`.
    fn summary(&self) -> &'static str;

    /// Evaluate the host, writing findings and score into `sink`.
    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    Severity(#[from] SeverityError),

    #[error("{field}: {message}")]
    Malformed { field: String, message: String },
}
