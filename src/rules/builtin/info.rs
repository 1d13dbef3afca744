use chrono::NaiveDateTime;

use crate::record::HostRecord;
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

/// `last_update` formats seen from the service, most specific first.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

/// Standard information about the host. Contributes no score.
pub struct InfoDetector;

impl Detector for InfoDetector {
    fn name(&self) -> &'static str {
        "info"
    }

    fn summary(&self) -> &'static str {
        "Standard information about the host"
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        if let Some(os) = host.os.as_deref().filter(|os| !os.is_empty()) {
            sink.record(
                Finding::new("os_id", os, format!("OS: {os}"), Severity::Info),
                Points::ZERO,
            );
        }

        if let Some(raw) = host.last_update.as_deref() {
            match parse_timestamp(raw) {
                Some(ts) => sink.record(
                    Finding::new(
                        "last_updated",
                        raw,
                        format!("Last Updated: {}", ts.format("%Y-%m-%d %H:%M")),
                        Severity::Info,
                    ),
                    Points::ZERO,
                ),
                None => tracing::debug!(host = %host.identifier(), raw, "unparsable last_update"),
            }
        }

        if !host.hostnames.is_empty() {
            sink.record(
                Finding::new(
                    "hostnames",
                    host.hostnames.len(),
                    format!("Hostnames: {}", host.hostnames.join(",")),
                    Severity::Info,
                )
                .with_items(host.hostnames.clone()),
                Points::ZERO,
            );
        }

        if !host.ports.is_empty() {
            let mut ports = host.ports.clone();
            ports.sort_unstable();
            ports.dedup();
            let listed: Vec<String> = ports.iter().map(u16::to_string).collect();
            sink.record(
                Finding::new(
                    "open_ports",
                    ports.len(),
                    format!("Open ports: {}", listed.join(",")),
                    Severity::Info,
                ),
                Points::ZERO,
            );
        }

        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
