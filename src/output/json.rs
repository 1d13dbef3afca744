use serde::Serialize;

use crate::aggregate::ResultSet;
use crate::error::Result;
use crate::record::HostIdentifier;
use crate::rules::{Finding, RuleFailure};

#[derive(Serialize)]
struct JsonHost<'a> {
    ip: &'a HostIdentifier,
    score: u64,
    findings: &'a [Finding],
    failures: &'a [RuleFailure],
}

/// Render ranked hosts as a JSON array.
pub fn render(results: &ResultSet) -> Result<String> {
    let hosts: Vec<JsonHost<'_>> = results
        .sorted()
        .into_iter()
        .map(|(ip, host)| JsonHost {
            ip,
            score: host.score(),
            findings: host.findings(),
            failures: host.failures(),
        })
        .collect();
    let json = serde_json::to_string_pretty(&hosts)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Endpoint, OutputHost, Points, Severity};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    #[test]
    fn stable_field_names() {
        let mut host = OutputHost::new();
        host.record(
            Finding::new("smb_anon", true, "Anonymous SMB access.", Severity::High).at(Endpoint {
                port: 445,
                protocol: "tcp".into(),
            }),
            Points::new(200),
        );
        let mut results = ResultSet::new();
        results.put("1.2.3.4".into(), host);

        let parsed: Value = serde_json::from_str(&render(&results).unwrap()).unwrap();
        assert_eq!(
            parsed,
            json!([{
                "ip": "1.2.3.4",
                "score": 200,
                "findings": [{
                    "id": "smb_anon",
                    "value": true,
                    "summary": "Anonymous SMB access.",
                    "port": 445,
                    "protocol": "tcp",
                    "severity": "HIGH",
                    "references": [],
                    "items": []
                }],
                "failures": []
            }])
        );
    }

    #[test]
    fn empty_results_are_an_empty_array() {
        assert_eq!(render(&ResultSet::new()).unwrap(), "[]");
    }
}
