use crate::record::fields::{array_at, display_scalar, is_truthy};
use crate::record::HostRecord;
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

/// SMB shares reachable from the internet.
pub struct FileShareDetector;

impl Detector for FileShareDetector {
    fn name(&self) -> &'static str {
        "files"
    }

    fn summary(&self) -> &'static str {
        "Details of any files found, such as FTP or SMB"
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        for probe in host.probes_with("smb") {
            let Some(smb) = probe.module("smb") else { continue };

            if is_truthy(smb.get("anonymous")) {
                sink.record(
                    Finding::new("smb_anon", true, "Anonymous SMB access.", Severity::High)
                        .at(probe.endpoint()),
                    Points::new(200),
                );
            }

            let shares: Vec<String> = array_at(smb, "shares")
                .iter()
                .filter_map(|share| {
                    let name = share.get("name").map(display_scalar)?;
                    let comments = share.get("comments").map(display_scalar).unwrap_or_default();
                    Some(format!("{name} {comments}").trim_end().to_string())
                })
                .collect();
            if !shares.is_empty() {
                sink.record(
                    Finding::new("smb_shares", true, "Discovered SMB shares", Severity::High)
                        .at(probe.endpoint())
                        .with_items(shares),
                    Points::new(100),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::test_support::{ids, run};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn anonymous_access_with_shares() {
        let output = run(
            &FileShareDetector,
            json!({
                "ip_str": "1.2.3.4",
                "data": [{
                    "port": 445,
                    "transport": "tcp",
                    "smb": {
                        "anonymous": true,
                        "shares": [
                            {"name": "ADMIN$", "comments": "Remote Admin"},
                            {"name": "public", "comments": ""}
                        ]
                    }
                }]
            }),
        );
        assert_eq!(ids(&output), vec!["smb_anon", "smb_shares"]);
        assert!(output.findings().iter().all(|f| f.severity == Severity::High));
        assert_eq!(output.findings()[1].items, vec!["ADMIN$ Remote Admin", "public"]);
        assert_eq!(output.score(), 300);
    }

    #[test]
    fn mistyped_host_fields_do_not_hide_smb() {
        let output = run(
            &FileShareDetector,
            json!({
                "ip_str": "1.2.3.4",
                "os": 5,
                "data": [{"port": 445, "transport": null, "smb": {"anonymous": true}}]
            }),
        );
        assert_eq!(ids(&output), vec!["smb_anon"]);
        assert_eq!(output.findings()[0].protocol(), Some("tcp"));
    }

    #[test]
    fn authenticated_smb_without_shares() {
        let output = run(
            &FileShareDetector,
            json!({"ip_str": "1.2.3.4", "data": [{"port": 445, "smb": {"anonymous": false}}]}),
        );
        assert!(output.is_empty());
    }
}
