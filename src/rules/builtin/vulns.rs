use crate::record::fields::{f64_at, strings_at};
use crate::record::{HostRecord, ServiceProbe};
use crate::rules::{Cvss, Detector, Finding, OutputHost, Points, RuleError, Severity};

/// Known vulnerabilities reported per service.
///
/// Runs only when the host's own `vulns` list is non-empty; per-service
/// entries on a host without one are ignored.
/// Emits one `vulns_count` summary carrying the highest severity seen,
/// followed by one finding per vulnerability. Each vulnerability adds
/// `round(cvss * 100)` points. A CVSS outside 0-10 aborts the rule for
/// this host; an entry without a CVSS is skipped.
pub struct VulnsDetector;

struct Vuln<'a> {
    id: &'a str,
    cvss: Cvss,
    doc: &'a serde_json::Value,
    probe: &'a ServiceProbe,
}

impl Detector for VulnsDetector {
    fn name(&self) -> &'static str {
        "vulns"
    }

    fn summary(&self) -> &'static str {
        "Provides details for any vulnerabilities discovered"
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        if host.vulns.is_empty() {
            return Ok(());
        }
        let vulns = collect(host)?;
        if vulns.is_empty() {
            return Ok(());
        }

        let highest = vulns
            .iter()
            .map(|v| v.cvss.severity())
            .max()
            .unwrap_or(Severity::Info);
        let total = vulns.len();
        let noun = if total == 1 { "vulnerability" } else { "vulnerabilities" };
        sink.add_finding(Finding::new(
            "vulns_count",
            total,
            format!("Found {total} {noun}"),
            highest,
        ));

        for vuln in vulns {
            let references: Vec<String> = strings_at(vuln.doc, "references").map(str::to_string).collect();
            let verified = vuln
                .doc
                .get("verified")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            let summary = vuln
                .doc
                .get("summary")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(vuln.id);

            sink.record(
                Finding::new(
                    format!("vuln_{}", vuln.id.replace('-', "_")),
                    vuln.id,
                    summary,
                    vuln.cvss.severity(),
                )
                .at(vuln.probe.endpoint())
                .with_references(references)
                .with_items(vec![format!("Verified: {verified}")]),
                Points::from_cvss(vuln.cvss),
            );
        }

        Ok(())
    }
}

/// Validate every entry before anything is emitted.
fn collect(host: &HostRecord) -> Result<Vec<Vuln<'_>>, RuleError> {
    let mut vulns = Vec::new();
    for probe in host.probes_with("vulns") {
        let Some(entries) = probe.module("vulns").and_then(|v| v.as_object()) else {
            continue;
        };
        for (id, doc) in entries {
            let Some(score) = f64_at(doc, "cvss") else {
                tracing::debug!(host = %host.identifier(), vuln = %id, "vulnerability without CVSS, skipping");
                continue;
            };
            vulns.push(Vuln {
                id: id.as_str(),
                cvss: Cvss::new(score)?,
                doc,
                probe,
            });
        }
    }
    Ok(vulns)
}
