use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::fields::{str_at, strings_at};
use crate::record::{HostRecord, ServiceProbe};
use crate::rules::{Detector, Finding, OutputHost, Points, RuleError, Severity};

const EOL_POINTS: Points = Points::new(500);

/// Leading `major.minor[.patch]`, tolerating a `v` prefix and any suffix
/// (`9.6.24 - Debian`, `v1.20.4`, `3.8.9-1`).
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*v?(\d+)\.(\d+)(?:\.(\d+))?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Version {
    major: u32,
    minor: u32,
    patch: Option<u32>,
}

/// `None` when the string does not start with a dotted version.
fn parse_version(raw: &str) -> Option<Version> {
    let caps = VERSION_RE.captures(raw)?;
    Some(Version {
        major: caps[1].parse().ok()?,
        minor: caps[2].parse().ok()?,
        patch: caps.get(3).and_then(|m| m.as_str().parse().ok()),
    })
}

/// What a probe reveals about one product: its raw version and the text
/// shown in the finding.
struct Detected<'a> {
    version: &'a str,
    detail: String,
}

struct EolCheck {
    id: &'static str,
    label: &'static str,
    detect: fn(&ServiceProbe) -> Option<Detected<'_>>,
    is_eol: fn(Version) -> bool,
}

const CHECKS: &[EolCheck] = &[
    EolCheck {
        id: "eol_os",
        label: "OS",
        detect: ntlm_build,
        is_eol: |v| v.major < 6 || (v.major == 6 && v.minor <= 1),
    },
    EolCheck {
        id: "eol_amqp",
        label: "AMQP",
        detect: rabbitmq,
        is_eol: |v| v.major < 3 || (v.major == 3 && v.minor < 9),
    },
    EolCheck {
        id: "eol_docker",
        label: "Docker",
        detect: |p| banner(p, "Docker"),
        is_eol: |v| v.major < 20,
    },
    EolCheck {
        id: "eol_db2",
        label: "DB2",
        detect: db2,
        is_eol: |v| v.major < 12,
    },
    EolCheck {
        id: "eol_kubernetes",
        label: "Kubernetes",
        detect: |p| banner(p, "Kubernetes"),
        is_eol: |v| v.major == 1 && v.minor <= 20,
    },
    EolCheck {
        id: "eol_mongodb",
        label: "Mongodb",
        detect: |p| banner(p, "MongoDB"),
        is_eol: |v| v.major < 4 || (v.major == 4 && v.minor <= 2),
    },
    EolCheck {
        id: "eol_mssql",
        label: "MSSQL",
        detect: mssql,
        is_eol: |v| v.major <= 11,
    },
    EolCheck {
        id: "eol_postgres",
        label: "Postgres",
        detect: |p| banner(p, "PostgreSQL"),
        is_eol: |v| v.major <= 10,
    },
];

/// End-of-life / end-of-support products, by version threshold.
pub struct EolDetector;

impl Detector for EolDetector {
    fn name(&self) -> &'static str {
        "eol"
    }

    fn summary(&self) -> &'static str {
        "Check for End of Life / End of Support products"
    }

    fn process(&self, host: &HostRecord, sink: &mut OutputHost) -> Result<(), RuleError> {
        for probe in &host.data {
            for check in CHECKS {
                let Some(found) = (check.detect)(probe) else { continue };
                let Some(version) = parse_version(found.version) else {
                    tracing::debug!(
                        host = %host.identifier(),
                        check = check.id,
                        version = found.version,
                        "unparsable version, check not applicable"
                    );
                    continue;
                };
                if (check.is_eol)(version) {
                    sink.record(
                        Finding::new(
                            check.id,
                            true,
                            format!("EOL {}: {}", check.label, found.detail),
                            Severity::Critical,
                        )
                        .at(probe.endpoint()),
                        EOL_POINTS,
                    );
                }
            }
        }
        Ok(())
    }
}

fn banner<'a>(probe: &'a ServiceProbe, product: &str) -> Option<Detected<'a>> {
    if probe.product()? != product {
        return None;
    }
    let version = probe.version()?;
    Some(Detected {
        version,
        detail: version.to_string(),
    })
}

fn ntlm_build(probe: &ServiceProbe) -> Option<Detected<'_>> {
    let ntlm = probe.module("ntlm")?;
    let version = str_at(ntlm, "os_build")?;
    let oses: Vec<&str> = strings_at(ntlm, "os").collect();
    let detail = if oses.is_empty() {
        version.to_string()
    } else {
        oses.join(",")
    };
    Some(Detected { version, detail })
}

fn rabbitmq(probe: &ServiceProbe) -> Option<Detected<'_>> {
    let props = probe.module("amqp")?.get("server_properties")?;
    let product = str_at(props, "product")?;
    if product != "RabbitMQ" {
        return None;
    }
    let version = str_at(props, "version")?;
    Some(Detected {
        version,
        detail: format!("{product} ({version})"),
    })
}

fn db2(probe: &ServiceProbe) -> Option<Detected<'_>> {
    let version = str_at(probe.module("ibm_db2")?, "db2_version")?;
    Some(Detected {
        version,
        detail: version.to_string(),
    })
}

fn mssql(probe: &ServiceProbe) -> Option<Detected<'_>> {
    let version = str_at(probe.module("mssql_ssrp")?, "version")?;
    Some(Detected {
        version,
        detail: version.to_string(),
    })
}
