use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::Value;

use crate::record::fields::{bool_at, f64_at, is_truthy, object_at, str_at, strings_at};
use crate::record::{HostRecord, ServiceProbe};
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

/// Legacy protocol versions with their severity and score.
const WEAK_PROTOCOLS: &[(&str, Severity, Points)] = &[
    ("SSLv2", Severity::High, Points::new(700)),
    ("SSLv3", Severity::High, Points::new(700)),
    ("TLSv1", Severity::Medium, Points::new(500)),
    ("TLSv1.1", Severity::Low, Points::new(300)),
];

/// Suites offering no authentication or no encryption.
const INSECURE_CIPHERS: &[&str] = &[
    "ADH-DES-CBC3-SHA",
    "ADH-AES128-SHA",
    "ADH-AES128-SHA256",
    "ADH-AES128-GCM-SHA256",
    "ADH-AES256-SHA",
    "ADH-AES256-SHA256",
    "ADH-AES256-GCM-SHA384",
    "ADH-CAMELLIA128-SHA",
    "ADH-CAMELLIA128-SHA256",
    "ADH-CAMELLIA256-SHA",
    "ADH-CAMELLIA256-SHA256",
    "ADH-SEED-SHA",
    "DHE-PSK-NULL-SHA",
    "DHE-PSK-NULL-SHA256",
    "DHE-PSK-NULL-SHA384",
    "AECDH-DES-CBC3-SHA",
    "AECDH-AES128-SHA",
    "AECDH-AES256-SHA",
    "AECDH-NULL-SHA",
    "ECDHE-ECDSA-NULL-SHA",
    "ECDHE-PSK-NULL-SHA",
    "ECDHE-PSK-NULL-SHA256",
    "ECDHE-PSK-NULL-SHA384",
    "ECDHE-RSA-NULL-SHA",
    "PSK-NULL-SHA",
    "PSK-NULL-SHA256",
    "PSK-NULL-SHA384",
    "RSA-PSK-NULL-SHA",
    "RSA-PSK-NULL-SHA256",
    "RSA-PSK-NULL-SHA384",
    "NULL-MD5",
    "NULL-SHA",
    "NULL-SHA256",
];

/// Suites without forward secrecy or with legacy block ciphers / CBC modes.
const WEAK_CIPHERS: &[&str] = &[
    "DHE-DSS-DES-CBC3-SHA",
    "DHE-DSS-AES128-SHA",
    "DHE-DSS-AES128-SHA256",
    "DHE-DSS-AES256-SHA",
    "DHE-DSS-AES256-SHA256",
    "DHE-DSS-CAMELLIA128-SHA",
    "DHE-DSS-CAMELLIA128-SHA256",
    "DHE-DSS-CAMELLIA256-SHA",
    "DHE-DSS-CAMELLIA256-SHA256",
    "DHE-DSS-SEED-SHA",
    "DHE-PSK-3DES-EDE-CBC-SHA",
    "DHE-PSK-AES128-CBC-SHA",
    "DHE-PSK-AES128-CBC-SHA256",
    "DHE-PSK-AES256-CBC-SHA",
    "DHE-PSK-AES256-CBC-SHA384",
    "DHE-PSK-CAMELLIA128-SHA256",
    "DHE-PSK-CAMELLIA256-SHA384",
    "DHE-RSA-DES-CBC3-SHA",
    "DHE-RSA-AES128-SHA",
    "DHE-RSA-AES128-SHA256",
    "DHE-RSA-AES256-SHA",
    "DHE-RSA-AES256-SHA256",
    "DHE-RSA-CAMELLIA128-SHA",
    "DHE-RSA-CAMELLIA128-SHA256",
    "DHE-RSA-CAMELLIA256-SHA",
    "DHE-RSA-CAMELLIA256-SHA256",
    "DHE-RSA-SEED-SHA",
    "ECDHE-ECDSA-DES-CBC3-SHA",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-ECDSA-AES128-SHA256",
    "ECDHE-ECDSA-AES256-SHA",
    "ECDHE-ECDSA-AES256-SHA384",
    "ECDHE-ECDSA-CAMELLIA128-SHA256",
    "ECDHE-ECDSA-CAMELLIA256-SHA384",
    "ECDHE-PSK-3DES-EDE-CBC-SHA",
    "ECDHE-PSK-AES128-CBC-SHA",
    "ECDHE-PSK-AES128-CBC-SHA256",
    "ECDHE-PSK-AES256-CBC-SHA",
    "ECDHE-PSK-AES256-CBC-SHA384",
    "ECDHE-PSK-CAMELLIA128-SHA256",
    "ECDHE-PSK-CAMELLIA256-SHA384",
    "ECDHE-RSA-DES-CBC3-SHA",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA256",
    "ECDHE-RSA-AES256-SHA",
    "ECDHE-RSA-AES256-SHA384",
    "ECDHE-RSA-CAMELLIA128-SHA256",
    "ECDHE-RSA-CAMELLIA256-SHA384",
    "PSK-3DES-EDE-CBC-SHA",
    "PSK-AES128-CBC-SHA",
    "PSK-AES128-CBC-SHA256",
    "PSK-AES128-CCM",
    "PSK-AES128-CCM8",
    "PSK-AES128-GCM-SHA256",
    "PSK-AES256-CBC-SHA",
    "PSK-AES256-CBC-SHA384",
    "PSK-AES256-CCM",
    "PSK-AES256-CCM8",
    "PSK-AES256-GCM-SHA384",
    "PSK-CAMELLIA128-SHA256",
    "PSK-CAMELLIA256-SHA384",
    "PSK-CHACHA20-POLY1305",
    "RSA-PSK-3DES-EDE-CBC-SHA",
    "RSA-PSK-AES128-CBC-SHA",
    "RSA-PSK-AES128-CBC-SHA256",
    "RSA-PSK-AES128-GCM-SHA256",
    "RSA-PSK-AES256-CBC-SHA",
    "RSA-PSK-AES256-CBC-SHA384",
    "RSA-PSK-AES256-GCM-SHA384",
    "RSA-PSK-CAMELLIA128-SHA256",
    "RSA-PSK-CAMELLIA256-SHA384",
    "RSA-PSK-CHACHA20-POLY1305",
    "DES-CBC3-SHA",
    "AES128-SHA",
    "AES128-SHA256",
    "AES128-CCM",
    "AES128-CCM8",
    "AES128-GCM-SHA256",
    "AES256-SHA",
    "AES256-SHA256",
    "AES256-CCM",
    "AES256-CCM8",
    "AES256-GCM-SHA384",
    "CAMELLIA128-SHA",
    "CAMELLIA128-SHA256",
    "CAMELLIA256-SHA",
    "CAMELLIA256-SHA256",
    "IDEA-CBC-SHA",
    "SEED-SHA",
    "SRP-DSS-3DES-EDE-CBC-SHA",
    "SRP-DSS-AES-128-CBC-SHA",
    "SRP-DSS-AES-256-CBC-SHA",
    "SRP-RSA-3DES-EDE-CBC-SHA",
    "SRP-RSA-AES-128-CBC-SHA",
    "SRP-RSA-AES-256-CBC-SHA",
    "SRP-3DES-EDE-CBC-SHA",
    "SRP-AES-128-CBC-SHA",
    "SRP-AES-256-CBC-SHA",
];

/// Certificates expiring within this window are flagged.
const EXPIRY_WINDOW_WEEKS: i64 = 12;
const CERT_TIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// SSL/TLS issues: legacy protocols, weak ciphers, certificate problems.
pub struct SslDetector;

impl Detector for SslDetector {
    fn name(&self) -> &'static str {
        "ssl"
    }

    fn summary(&self) -> &'static str {
        "Findings related to SSL/TLS issues such as legacy protocols and weak ciphers"
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        let now = Utc::now().naive_utc();
        for probe in host.probes_with("ssl") {
            let Some(ssl) = probe.module("ssl") else { continue };
            check_protocols(probe, ssl, sink);
            if let Some(cert) = ssl.get("cert").filter(|c| c.is_object()) {
                check_cert(probe, ssl, cert, now, sink);
            }
            check_cipher(probe, ssl, sink);
        }
        Ok(())
    }
}

fn check_protocols(probe: &ServiceProbe, ssl: &Value, sink: &mut OutputHost) {
    // Unsupported versions are listed with a leading '-' and never match.
    for version in strings_at(ssl, "versions") {
        if let Some((_, severity, points)) = WEAK_PROTOCOLS.iter().find(|(v, _, _)| *v == version) {
            sink.record(
                Finding::new(
                    format!("protocol_weak_{version}"),
                    version,
                    format!("Weak protocol: {version}"),
                    *severity,
                )
                .at(probe.endpoint()),
                *points,
            );
        }
    }
}

fn check_cert(probe: &ServiceProbe, ssl: &Value, cert: &Value, now: NaiveDateTime, sink: &mut OutputHost) {
    if let Some(algo) = str_at(cert, "sig_algo").filter(|a| *a == "sha1WithRSAEncryption") {
        sink.record(
            Finding::new("cert_sha1_signing", algo, "SHA1 signed cert", Severity::Medium)
                .at(probe.endpoint()),
            Points::new(50),
        );
    }

    let expired = bool_at(cert, "expired").unwrap_or(false);
    if expired {
        sink.record(
            Finding::new("cert_expired", true, "Expired cert", Severity::High).at(probe.endpoint()),
            Points::new(200),
        );
    } else if let Some(expires) = str_at(cert, "expires")
        .and_then(|raw| NaiveDateTime::parse_from_str(raw, CERT_TIME_FORMAT).ok())
    {
        if expires < now + Duration::weeks(EXPIRY_WINDOW_WEEKS) {
            let formatted = expires.format("%Y-%m-%d %H:%M").to_string();
            sink.record(
                Finding::new(
                    "cert_expires_soon",
                    formatted.clone(),
                    format!("Cert expires soon: {formatted}"),
                    Severity::Low,
                )
                .at(probe.endpoint()),
                Points::new(50),
            );
        }
    }

    if let Some(pubkey) = cert.get("pubkey") {
        let bits = f64_at(pubkey, "bits");
        if let (Some("rsa"), Some(bits)) = (str_at(pubkey, "type"), bits) {
            if bits <= 1024.0 {
                sink.record(
                    Finding::new(
                        "cert_rsa_pub_keysize",
                        bits as u64,
                        format!("Cert uses low public key size: {}", bits as u64),
                        Severity::Low,
                    )
                    .at(probe.endpoint()),
                    Points::new(50),
                );
            }
        }
    }

    if let Some(cn) = cert.get("subject").and_then(|s| str_at(s, "CN")) {
        if cn.contains("*.") {
            sink.record(
                Finding::new("cert_wildcard_cn", cn, format!("Wildcard cert CN: {cn}"), Severity::Low)
                    .at(probe.endpoint()),
                Points::new(50),
            );
        }
    }

    let alt_names = cert
        .get("extensions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|ext| str_at(ext, "name") == Some("subjectAltName"))
        .and_then(|ext| str_at(ext, "data"));
    if let Some(alt_names) = alt_names.filter(|names| names.contains("*.")) {
        sink.record(
            Finding::new(
                "cert_wildcard_altnames",
                alt_names,
                format!("Wildcard cert alt names: {alt_names}"),
                Severity::Low,
            )
            .at(probe.endpoint()),
            Points::new(50),
        );
    }

    if let Some(trust) = object_at(ssl, "trust") {
        if is_truthy(trust.get("revoked")) {
            sink.record(
                Finding::new("cert_revoked", true, "Cert revoked", Severity::High).at(probe.endpoint()),
                Points::new(200),
            );
        }
    }
}

fn check_cipher(probe: &ServiceProbe, ssl: &Value, sink: &mut OutputHost) {
    let Some(name) = ssl.get("cipher").and_then(|c| str_at(c, "name")) else {
        return;
    };

    if INSECURE_CIPHERS.contains(&name) {
        sink.record(
            Finding::new("cipher_insecure", name, format!("Insecure cipher: {name}"), Severity::High)
                .at(probe.endpoint()),
            Points::new(200),
        );
    }

    if WEAK_CIPHERS.contains(&name) {
        sink.record(
            Finding::new("cipher_weak", name, format!("Weak cipher: {name}"), Severity::Medium)
                .at(probe.endpoint()),
            Points::new(100),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::test_support::{ids, run};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tls_host(ssl: Value) -> Value {
        json!({
            "ip_str": "1.2.3.4",
            "data": [{"port": 443, "transport": "tcp", "ssl": ssl}]
        })
    }

    #[test]
    fn legacy_protocol_and_weak_cipher() {
        let output = run(
            &SslDetector,
            tls_host(json!({
                "versions": ["SSLv3", "-SSLv2", "TLSv1.2"],
                "cipher": {"name": "DES-CBC3-SHA", "bits": 168}
            })),
        );
        assert_eq!(ids(&output), vec!["protocol_weak_SSLv3", "cipher_weak"]);
        assert_eq!(output.findings()[0].severity, Severity::High);
        assert_eq!(output.findings()[1].severity, Severity::Medium);
        assert_eq!(output.findings()[0].port(), Some(443));
        assert_eq!(output.score(), 800);
    }

    #[test]
    fn insecure_cipher() {
        let output = run(
            &SslDetector,
            tls_host(json!({"versions": [], "cipher": {"name": "NULL-SHA"}})),
        );
        assert_eq!(ids(&output), vec!["cipher_insecure"]);
        assert_eq!(output.score(), 200);
    }

    #[test]
    fn certificate_problems() {
        let output = run(
            &SslDetector,
            tls_host(json!({
                "versions": ["TLSv1.2"],
                "cert": {
                    "sig_algo": "sha1WithRSAEncryption",
                    "expired": true,
                    "pubkey": {"type": "rsa", "bits": 1024},
                    "subject": {"CN": "*.example.com"},
                    "extensions": [
                        {"name": "basicConstraints", "data": "CA:FALSE"},
                        {"name": "subjectAltName", "data": "*.example.com, example.com"}
                    ]
                },
                "trust": {"revoked": true}
            })),
        );
        assert_eq!(
            ids(&output),
            vec![
                "cert_sha1_signing",
                "cert_expired",
                "cert_rsa_pub_keysize",
                "cert_wildcard_cn",
                "cert_wildcard_altnames",
                "cert_revoked"
            ]
        );
        assert_eq!(output.score(), 50 + 200 + 50 + 50 + 50 + 200);
    }

    #[test]
    fn expiry_window() {
        let soon = (Utc::now() + Duration::weeks(2)).format(CERT_TIME_FORMAT).to_string();
        let later = (Utc::now() + Duration::weeks(52)).format(CERT_TIME_FORMAT).to_string();

        let output = run(&SslDetector, tls_host(json!({"cert": {"expires": soon}})));
        assert_eq!(ids(&output), vec!["cert_expires_soon"]);

        let output = run(&SslDetector, tls_host(json!({"cert": {"expires": later}})));
        assert!(output.is_empty());
    }

    #[test]
    fn partial_document_is_tolerated() {
        let output = run(
            &SslDetector,
            tls_host(json!({"cert": {"expires": "garbage", "pubkey": {"type": "rsa"}}, "cipher": null})),
        );
        assert!(output.is_empty());
    }
}
