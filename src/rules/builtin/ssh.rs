use crate::record::fields::strings_at;
use crate::record::{HostRecord, ServiceProbe};
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

const WEAK_KEX: &[&str] = &[
    "diffie-hellman-group-exchange-sha1",
    "diffie-hellman-group1-sha1",
    "gss-gex-sha1-",
    "gss-group1-sha1-",
    "gss-group14-sha1-",
    "rsa1024-sha1",
];

const WEAK_ENC: &[&str] = &["3des-", "arcfour-", "blowfish-", "cast128-", "rijndael-"];

const WEAK_MAC: &[&str] = &["md5", "sha1", "umac-64"];

const WEAKNESS_POINTS: Points = Points::new(20);

/// (kex document key, finding id, label, substring denylist)
const ALGORITHM_CHECKS: &[(&str, &str, &str, &[&str])] = &[
    ("kex_algorithms", "ssh_weak_kex", "KEX", WEAK_KEX),
    ("encryption_algorithms", "ssh_weak_enc", "Encryption", WEAK_ENC),
    ("mac_algorithms", "ssh_weak_mac", "MAC", WEAK_MAC),
];

/// Protocol version 1 and weak negotiated algorithms.
pub struct SshDetector;

impl Detector for SshDetector {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn summary(&self) -> &'static str {
        "Perform checks for SSH weaknesses"
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        for probe in host.probes_with("ssh") {
            if probe.version() == Some("1.0") {
                sink.record(
                    Finding::new("ssh_version_1_0", "1.0", "SSH version: 1.0", Severity::Low)
                        .at(probe.endpoint()),
                    WEAKNESS_POINTS,
                );
            }
            check_algorithms(probe, sink);
        }
        Ok(())
    }
}

fn check_algorithms(probe: &ServiceProbe, sink: &mut OutputHost) {
    let Some(kex) = probe.module("ssh").and_then(|ssh| ssh.get("kex")) else {
        return;
    };
    for (key, id, label, denylist) in ALGORITHM_CHECKS {
        for algo in strings_at(kex, key) {
            if denylist.iter().any(|weak| algo.contains(weak)) {
                sink.record(
                    Finding::new(*id, algo, format!("SSH Weak {label}: {algo}"), Severity::Low)
                        .at(probe.endpoint()),
                    WEAKNESS_POINTS,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::test_support::{ids, run};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn weak_algorithms_by_substring() {
        let output = run(
            &SshDetector,
            json!({
                "ip_str": "1.2.3.4",
                "data": [{
                    "port": 22,
                    "transport": "tcp",
                    "version": "2.0",
                    "ssh": {"kex": {
                        "kex_algorithms": ["curve25519-sha256", "diffie-hellman-group1-sha1"],
                        "encryption_algorithms": ["aes128-ctr", "3des-cbc", "blowfish-cbc"],
                        "mac_algorithms": ["hmac-sha2-256", "hmac-md5"]
                    }}
                }]
            }),
        );
        assert_eq!(
            ids(&output),
            vec!["ssh_weak_kex", "ssh_weak_enc", "ssh_weak_enc", "ssh_weak_mac"]
        );
        assert_eq!(output.findings()[2].summary, "SSH Weak Encryption: blowfish-cbc");
        assert!(output.findings().iter().all(|f| f.severity == Severity::Low));
        assert_eq!(output.score(), 80);
    }

    #[test]
    fn protocol_version_one() {
        let output = run(
            &SshDetector,
            json!({"ip_str": "1.2.3.4", "data": [{"port": 22, "version": "1.0", "ssh": {}}]}),
        );
        assert_eq!(ids(&output), vec!["ssh_version_1_0"]);
        assert_eq!(output.score(), 20);
    }

    #[test]
    fn version_without_ssh_document_is_ignored() {
        let output = run(
            &SshDetector,
            json!({"ip_str": "1.2.3.4", "data": [{"port": 80, "version": "1.0"}]}),
        );
        assert!(output.is_empty());
    }
}
